use convfuse::ops::{
    bilinear, interpolation_weights, Conv2dGeometry, ConvPadding, MirrorPadMode, Paddings,
    ResizeSize, Strides,
};
use convfuse::{
    with_element_type, CpuBackendContext, Element, KernelError, KernelResult, Tensor,
};

use crate::kernel::conv2d_rows;

/// Attributes of [`FusedResizeAndPadConv2D`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusedResizePadAttrs {
    /// `"REFLECT"` or `"SYMMETRIC"`.
    pub mode: String,
    pub strides: Vec<usize>,
    pub padding: String,
    pub resize_align_corners: bool,
}

/// Attributes of [`FusedPadConv2D`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusedPadAttrs {
    pub mode: String,
    pub strides: Vec<usize>,
    pub padding: String,
}

#[derive(Debug, Clone, Copy)]
struct MirrorPadConv {
    mode: MirrorPadMode,
    strides: Strides,
    padding: ConvPadding,
}

impl MirrorPadConv {
    fn new(mode: &str, strides: &[usize], padding: &str) -> KernelResult<Self> {
        Ok(MirrorPadConv {
            mode: mode.parse()?,
            strides: Strides::from_nhwc(strides)?,
            padding: padding.parse()?,
        })
    }

    /// Convolves the (optionally resized) mirror-padded input without materializing either.
    fn compute(
        &self,
        op: &'static str,
        backend: &CpuBackendContext,
        input: &Tensor,
        resize: Option<(ResizeSize, bool)>,
        paddings: &Paddings,
        filter: &Tensor,
    ) -> KernelResult<Tensor> {
        if filter.dtype() != input.dtype() {
            return Err(KernelError::DTypeMismatch {
                expected: input.dtype(),
                actual: filter.dtype(),
            });
        }
        let [batch, in_h, in_w, depth] = input.shape().as_nhwc().ok_or_else(|| {
            KernelError::shape_mismatch(format!(
                "{op} expects a rank-4 NHWC input, got {:?}",
                input.dims()
            ))
        })?;
        if in_h == 0 || in_w == 0 {
            return Err(KernelError::invalid_argument(format!(
                "{op} input must have positive spatial size"
            )));
        }
        paddings.validate_spatial_only()?;
        let (rh, rw) = match resize {
            Some((size, _)) => (size.height, size.width),
            None => (in_h, in_w),
        };
        let resized = [batch, rh, rw, depth];
        paddings.validate_mirror(resized, self.mode)?;
        let g = Conv2dGeometry::new(
            paddings.padded_dims(resized),
            filter.shape(),
            self.strides,
            self.padding,
        )?;
        tracing::debug!(
            op,
            mode = %self.mode,
            dtype = %input.dtype(),
            input = %input.shape(),
            resized_h = rh,
            resized_w = rw,
            filter = %filter.shape(),
            threads = backend.max_num_threads(),
            "computing fused mirror-pad conv2d"
        );

        let mode = self.mode;
        let pad_top = paddings.dim(1)[0];
        let pad_left = paddings.dim(2)[0];
        with_element_type!(input.dtype(), E => {
            let source = input.as_slice::<E>()?;
            let filter = filter.as_slice::<E>()?;
            let at = |n: usize, y: usize, x: usize, c: usize| {
                source[((n * in_h + y) * in_w + x) * depth + c]
            };
            let values = match resize {
                None => conv2d_rows::<E, _, _>(
                    backend,
                    &g,
                    filter,
                    |n, y, x, c| {
                        let sy = mode.source_index(y, pad_top, rh);
                        let sx = mode.source_index(x, pad_left, rw);
                        at(n, sy, sx, c).to_f64()
                    },
                    |_, value| value,
                )?,
                Some((size, align_corners)) => {
                    let ys = interpolation_weights(in_h, size.height, align_corners);
                    let xs = interpolation_weights(in_w, size.width, align_corners);
                    conv2d_rows::<E, _, _>(
                        backend,
                        &g,
                        filter,
                        |n, y, x, c| {
                            let yi = ys[mode.source_index(y, pad_top, rh)];
                            let xi = xs[mode.source_index(x, pad_left, rw)];
                            let value = bilinear(
                                at(n, yi.lower, xi.lower, c).to_f32(),
                                at(n, yi.lower, xi.upper, c).to_f32(),
                                at(n, yi.upper, xi.lower, c).to_f32(),
                                at(n, yi.upper, xi.upper, c).to_f32(),
                                xi.lerp,
                                yi.lerp,
                            );
                            E::from_f32(value).to_f64()
                        },
                        |_, value| value,
                    )?
                }
            };
            Tensor::from_vec(g.output_shape(), values)
        })
    }
}

/// Bilinear resize, mirror pad and convolution in a single pass.
#[derive(Debug, Clone, Copy)]
pub struct FusedResizeAndPadConv2D {
    inner: MirrorPadConv,
    align_corners: bool,
}

impl FusedResizeAndPadConv2D {
    pub const NAME: &'static str = "FusedResizeAndPadConv2D";

    pub fn new(attrs: &FusedResizePadAttrs) -> KernelResult<Self> {
        Ok(FusedResizeAndPadConv2D {
            inner: MirrorPadConv::new(&attrs.mode, &attrs.strides, &attrs.padding)?,
            align_corners: attrs.resize_align_corners,
        })
    }

    pub fn compute(
        &self,
        backend: &CpuBackendContext,
        input: &Tensor,
        size: ResizeSize,
        paddings: &Paddings,
        filter: &Tensor,
    ) -> KernelResult<Tensor> {
        self.inner.compute(
            Self::NAME,
            backend,
            input,
            Some((size, self.align_corners)),
            paddings,
            filter,
        )
    }
}

/// Mirror pad and convolution in a single pass.
#[derive(Debug, Clone, Copy)]
pub struct FusedPadConv2D {
    inner: MirrorPadConv,
}

impl FusedPadConv2D {
    pub const NAME: &'static str = "FusedPadConv2D";

    pub fn new(attrs: &FusedPadAttrs) -> KernelResult<Self> {
        Ok(FusedPadConv2D {
            inner: MirrorPadConv::new(&attrs.mode, &attrs.strides, &attrs.padding)?,
        })
    }

    pub fn compute(
        &self,
        backend: &CpuBackendContext,
        input: &Tensor,
        paddings: &Paddings,
        filter: &Tensor,
    ) -> KernelResult<Tensor> {
        self.inner
            .compute(Self::NAME, backend, input, None, paddings, filter)
    }
}
