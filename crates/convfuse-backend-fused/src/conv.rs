use convfuse::ops::{Activation, Conv2dGeometry, ConvPadding, Strides};
use convfuse::{
    with_element_type, CpuBackendContext, Element, FusedOp, FusionSpec, KernelError,
    KernelResult, Tensor,
};

use crate::kernel::conv2d_rows;

/// Attributes of [`FusedConv2D`] as they arrive from a graph definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusedConv2dAttrs {
    pub fused_ops: Vec<String>,
    /// Number of auxiliary tensors passed to `compute`.
    pub num_args: usize,
    /// NHWC strides `[1, sh, sw, 1]`.
    pub strides: Vec<usize>,
    /// `"SAME"` or `"VALID"`.
    pub padding: String,
}

/// Convolution followed by an epilogue of bias-adds and activations, in one pass.
#[derive(Debug, Clone)]
pub struct FusedConv2D {
    fusion: FusionSpec,
    strides: Strides,
    padding: ConvPadding,
}

enum EpilogueStep<'a, E> {
    Bias(&'a [E]),
    Activation(Activation),
}

impl FusedConv2D {
    pub const NAME: &'static str = "_FusedConv2D";

    pub fn new(attrs: &FusedConv2dAttrs) -> KernelResult<Self> {
        let fusion = FusionSpec::parse(attrs.fused_ops.as_slice())?;
        if attrs.num_args != fusion.num_args() {
            return Err(KernelError::invalid_attribute(
                "num_args",
                format!(
                    "fused ops {fusion} consume {} arguments, got num_args = {}",
                    fusion.num_args(),
                    attrs.num_args
                ),
            ));
        }
        Ok(FusedConv2D {
            strides: Strides::from_nhwc(&attrs.strides)?,
            padding: attrs.padding.parse()?,
            fusion,
        })
    }

    pub fn fusion(&self) -> &FusionSpec {
        &self.fusion
    }

    pub fn compute(
        &self,
        backend: &CpuBackendContext,
        input: &Tensor,
        filter: &Tensor,
        args: &[Tensor],
    ) -> KernelResult<Tensor> {
        let dtype = input.dtype();
        for tensor in std::iter::once(filter).chain(args) {
            if tensor.dtype() != dtype {
                return Err(KernelError::DTypeMismatch {
                    expected: dtype,
                    actual: tensor.dtype(),
                });
            }
        }
        if args.len() != self.fusion.num_args() {
            return Err(KernelError::invalid_argument(format!(
                "{} expects {} auxiliary tensors, got {}",
                Self::NAME,
                self.fusion.num_args(),
                args.len()
            )));
        }
        let dims = input.shape().as_nhwc().ok_or_else(|| {
            KernelError::shape_mismatch(format!(
                "{} expects a rank-4 NHWC input, got {:?}",
                Self::NAME,
                input.dims()
            ))
        })?;
        let g = Conv2dGeometry::new(dims, filter.shape(), self.strides, self.padding)?;
        for arg in args {
            if arg.dims() != [g.out_depth] {
                return Err(KernelError::shape_mismatch(format!(
                    "bias must have shape [{}], got {:?}",
                    g.out_depth,
                    arg.dims()
                )));
            }
        }
        tracing::debug!(
            op = Self::NAME,
            fused_ops = %self.fusion,
            dtype = %dtype,
            input = %input.shape(),
            filter = %filter.shape(),
            threads = backend.max_num_threads(),
            "computing fused conv2d"
        );

        with_element_type!(dtype, E => {
            let source = input.as_slice::<E>()?;
            let mut biases = args.iter();
            let mut steps: Vec<EpilogueStep<'_, E>> = Vec::with_capacity(self.fusion.ops().len());
            for op in self.fusion.ops() {
                match op {
                    FusedOp::BiasAdd => {
                        let bias = biases.next().ok_or_else(|| {
                            KernelError::invalid_argument("missing bias argument")
                        })?;
                        steps.push(EpilogueStep::Bias(bias.as_slice::<E>()?));
                    }
                    FusedOp::Activation(act) => steps.push(EpilogueStep::Activation(*act)),
                }
            }
            let values = conv2d_rows::<E, _, _>(
                backend,
                &g,
                filter.as_slice::<E>()?,
                |n, y, x, ci| source[((n * g.in_h + y) * g.in_w + x) * g.in_depth + ci].to_f64(),
                |co, value| apply_epilogue(&steps, co, value),
            )?;
            Tensor::from_vec(g.output_shape(), values)
        })
    }
}

fn apply_epilogue<E: Element>(steps: &[EpilogueStep<'_, E>], co: usize, value: E) -> E {
    steps.iter().fold(value, |v, step| match step {
        EpilogueStep::Bias(bias) => E::from_f64(v.to_f64() + bias[co].to_f64()),
        EpilogueStep::Activation(act) => E::from_f64(act.apply(v.to_f64())),
    })
}
