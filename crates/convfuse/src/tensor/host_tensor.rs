//! Immutable host tensor shared by the reference primitives, fused kernels and verifier.

use std::sync::Arc;

use half::f16;
use rand::Rng;

use super::dtype::DType;
use super::element::Element;
use super::shape::Shape;
use crate::error::{KernelError, KernelResult};
use crate::with_element_type;

/// Typed row-major backing buffer.
#[derive(Debug, Clone)]
pub enum TensorData {
    F16(Arc<[f16]>),
    F32(Arc<[f32]>),
    F64(Arc<[f64]>),
}

impl TensorData {
    pub fn dtype(&self) -> DType {
        match self {
            TensorData::F16(_) => DType::F16,
            TensorData::F32(_) => DType::F32,
            TensorData::F64(_) => DType::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TensorData::F16(values) => values.len(),
            TensorData::F32(values) => values.len(),
            TensorData::F64(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Dense NHWC-agnostic tensor with an immutable, reference-counted buffer.
///
/// Clones share the buffer; every operation producing new values allocates a new tensor.
#[derive(Debug, Clone)]
pub struct Tensor {
    shape: Shape,
    data: TensorData,
}

impl Tensor {
    /// Builds a tensor from owned values, validating the length against the shape.
    pub fn from_vec<E: Element>(shape: Shape, data: Vec<E>) -> KernelResult<Self> {
        if data.len() != shape.num_elements() {
            return Err(KernelError::shape_mismatch(format!(
                "tensor data length ({}) does not match shape {:?}",
                data.len(),
                shape.dims()
            )));
        }
        Ok(Tensor {
            shape,
            data: E::into_data(data),
        })
    }

    /// Builds a tensor from f64 values, rounding each into `dtype`.
    pub fn from_f64_values(dtype: DType, shape: Shape, values: &[f64]) -> KernelResult<Self> {
        with_element_type!(dtype, E => {
            Tensor::from_vec(shape, values.iter().map(|&v| E::from_f64(v)).collect::<Vec<E>>())
        })
    }

    pub fn zeros(dtype: DType, shape: Shape) -> Self {
        let len = shape.num_elements();
        let data = with_element_type!(dtype, E => E::into_data(vec![E::zero(); len]));
        Tensor { shape, data }
    }

    /// Fills `start, start + 1, ...` in row-major order.
    ///
    /// Values are produced in f32 and then converted, so large iota tensors saturate
    /// the same way for every dtype that is at least as wide as f32.
    pub fn iota(dtype: DType, shape: Shape, start: f32) -> Self {
        let len = shape.num_elements();
        let data = with_element_type!(dtype, E => {
            E::into_data((0..len).map(|i| E::from_f32(start + i as f32)).collect())
        });
        Tensor { shape, data }
    }

    /// Samples each element uniformly from `[-1, 1)`.
    pub fn random(dtype: DType, shape: Shape, rng: &mut impl Rng) -> Self {
        let len = shape.num_elements();
        let data = with_element_type!(dtype, E => {
            E::into_data(
                (0..len)
                    .map(|_| E::from_f32(rng.gen::<f32>() * 2.0 - 1.0))
                    .collect(),
            )
        });
        Tensor { shape, data }
    }

    /// Returns the total number of elements stored in the tensor.
    pub fn len(&self) -> usize {
        self.shape.num_elements()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    /// Borrows the typed buffer, failing when `E` is not the tensor dtype.
    pub fn as_slice<E: Element>(&self) -> KernelResult<&[E]> {
        E::view(&self.data).ok_or(KernelError::DTypeMismatch {
            expected: E::DTYPE,
            actual: self.dtype(),
        })
    }

    /// Element-wise conversion into `dtype`.
    ///
    /// Narrow sources round through f32 and f64 sources through f64, which keeps every
    /// conversion a single rounding step.
    pub fn cast(&self, dtype: DType) -> Tensor {
        if dtype == self.dtype() {
            return self.clone();
        }
        let data = match &self.data {
            TensorData::F64(values) => with_element_type!(dtype, E => {
                E::into_data(values.iter().map(|&v| E::from_f64(v)).collect())
            }),
            TensorData::F32(values) => with_element_type!(dtype, E => {
                E::into_data(values.iter().map(|&v| E::from_f32(v)).collect())
            }),
            TensorData::F16(values) => with_element_type!(dtype, E => {
                E::into_data(values.iter().map(|&v| E::from_f32(v.to_f32())).collect())
            }),
        };
        Tensor {
            shape: self.shape.clone(),
            data,
        }
    }

    /// Widening copy of the buffer.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match &self.data {
            TensorData::F16(values) => values.iter().map(|v| v.to_f64()).collect(),
            TensorData::F32(values) => values.iter().map(|&v| v as f64).collect(),
            TensorData::F64(values) => values.to_vec(),
        }
    }
}
