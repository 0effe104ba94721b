//! Numeric element capability implemented by every dtype a tensor can hold.

use std::fmt;
use std::sync::Arc;

use half::f16;

use super::dtype::DType;
use super::host_tensor::TensorData;

/// Element types storable in a [`Tensor`](super::Tensor).
///
/// Kernels accumulate in `f64` and round back through [`Element::from_f64`], so every
/// conversion here must be deterministic. Values read from `f32` intermediates (bilinear
/// resize output, iota and random fills) go through [`Element::from_f32`].
pub trait Element: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    const DTYPE: DType;

    fn zero() -> Self;
    fn from_f64(v: f64) -> Self;
    fn to_f64(self) -> f64;
    fn from_f32(v: f32) -> Self;
    fn to_f32(self) -> f32;

    /// Wraps an owned buffer in the matching [`TensorData`] variant.
    fn into_data(values: Vec<Self>) -> TensorData;
    /// Borrows the buffer when `data` holds this element type.
    fn view(data: &TensorData) -> Option<&[Self]>;
}

impl Element for f16 {
    const DTYPE: DType = DType::F16;

    fn zero() -> Self {
        f16::ZERO
    }

    fn from_f64(v: f64) -> Self {
        f16::from_f64(v)
    }

    fn to_f64(self) -> f64 {
        f16::to_f64(self)
    }

    fn from_f32(v: f32) -> Self {
        f16::from_f32(v)
    }

    fn to_f32(self) -> f32 {
        f16::to_f32(self)
    }

    fn into_data(values: Vec<Self>) -> TensorData {
        TensorData::F16(Arc::from(values))
    }

    fn view(data: &TensorData) -> Option<&[Self]> {
        match data {
            TensorData::F16(values) => Some(values),
            _ => None,
        }
    }
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    fn zero() -> Self {
        0.0
    }

    fn from_f64(v: f64) -> Self {
        v as f32
    }

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn from_f32(v: f32) -> Self {
        v
    }

    fn to_f32(self) -> f32 {
        self
    }

    fn into_data(values: Vec<Self>) -> TensorData {
        TensorData::F32(Arc::from(values))
    }

    fn view(data: &TensorData) -> Option<&[Self]> {
        match data {
            TensorData::F32(values) => Some(values),
            _ => None,
        }
    }
}

impl Element for f64 {
    const DTYPE: DType = DType::F64;

    fn zero() -> Self {
        0.0
    }

    fn from_f64(v: f64) -> Self {
        v
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn from_f32(v: f32) -> Self {
        v as f64
    }

    fn to_f32(self) -> f32 {
        self as f32
    }

    fn into_data(values: Vec<Self>) -> TensorData {
        TensorData::F64(Arc::from(values))
    }

    fn view(data: &TensorData) -> Option<&[Self]> {
        match data {
            TensorData::F64(values) => Some(values),
            _ => None,
        }
    }
}

/// Binds `$E` to the element type matching a runtime [`DType`] and evaluates `$body`.
///
/// ```ignore
/// let len = with_element_type!(tensor.dtype(), E => tensor.as_slice::<E>()?.len());
/// ```
#[macro_export]
macro_rules! with_element_type {
    ($dtype:expr, $E:ident => $body:expr) => {
        match $dtype {
            $crate::tensor::DType::F16 => {
                type $E = $crate::tensor::f16;
                $body
            }
            $crate::tensor::DType::F32 => {
                type $E = f32;
                $body
            }
            $crate::tensor::DType::F64 => {
                type $E = f64;
                $body
            }
        }
    };
}
