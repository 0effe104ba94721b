//! Convolution attributes and output geometry (NHWC activations, HWIO filters).

use std::fmt;
use std::str::FromStr;

use crate::error::{KernelError, KernelResult};
use crate::tensor::Shape;

/// Zero-border padding scheme applied by the convolution itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvPadding {
    Same,
    Valid,
}

impl ConvPadding {
    pub fn as_str(self) -> &'static str {
        match self {
            ConvPadding::Same => "SAME",
            ConvPadding::Valid => "VALID",
        }
    }

    /// Number of output positions along one spatial axis.
    pub fn output_size(self, input: usize, window: usize, stride: usize) -> KernelResult<usize> {
        if window == 0 {
            return Err(KernelError::invalid_argument("conv2d window must be > 0"));
        }
        if stride == 0 {
            return Err(KernelError::invalid_argument("conv2d stride must be > 0"));
        }
        match self {
            ConvPadding::Same => Ok(input.div_ceil(stride)),
            ConvPadding::Valid => {
                if window > input {
                    return Err(KernelError::invalid_argument(format!(
                        "conv2d window ({window}) exceeds input ({input}) with VALID padding"
                    )));
                }
                Ok((input - window + stride) / stride)
            }
        }
    }

    /// Zero rows or columns inserted before the first input position.
    pub fn pad_before(self, input: usize, window: usize, stride: usize) -> KernelResult<usize> {
        let out = self.output_size(input, window, stride)?;
        match self {
            ConvPadding::Valid => Ok(0),
            ConvPadding::Same => {
                let needed = (out.saturating_sub(1) * stride + window).saturating_sub(input);
                Ok(needed / 2)
            }
        }
    }
}

impl fmt::Display for ConvPadding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConvPadding {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SAME" => Ok(ConvPadding::Same),
            "VALID" => Ok(ConvPadding::Valid),
            other => Err(KernelError::invalid_attribute(
                "padding",
                format!("expected SAME or VALID, got `{other}`"),
            )),
        }
    }
}

/// Spatial strides of a 2-D convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Strides {
    pub h: usize,
    pub w: usize,
}

impl Strides {
    pub fn new(h: usize, w: usize) -> Self {
        Strides { h, w }
    }

    /// Parses a 4-element NHWC stride attribute `[1, sh, sw, 1]`.
    pub fn from_nhwc(strides: &[usize]) -> KernelResult<Self> {
        let &[sn, sh, sw, sc] = strides else {
            return Err(KernelError::invalid_attribute(
                "strides",
                format!("expected 4 entries, got {}", strides.len()),
            ));
        };
        if sn != 1 || sc != 1 {
            return Err(KernelError::invalid_attribute(
                "strides",
                "strides in the batch and depth dimensions must be 1",
            ));
        }
        if sh == 0 || sw == 0 {
            return Err(KernelError::invalid_attribute(
                "strides",
                "spatial strides must be > 0",
            ));
        }
        Ok(Strides { h: sh, w: sw })
    }

    pub fn to_nhwc(self) -> Vec<usize> {
        vec![1, self.h, self.w, 1]
    }
}

impl fmt::Display for Strides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.h, self.w)
    }
}

/// Output shape and border offsets of a validated NHWC x HWIO convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv2dGeometry {
    pub batch: usize,
    pub in_h: usize,
    pub in_w: usize,
    pub in_depth: usize,
    pub filter_h: usize,
    pub filter_w: usize,
    pub out_depth: usize,
    pub out_h: usize,
    pub out_w: usize,
    pub pad_top: usize,
    pub pad_left: usize,
    pub strides: Strides,
}

impl Conv2dGeometry {
    /// Validates `[N, H, W, C]` against an `[FH, FW, C, O]` filter.
    pub fn new(
        input: [usize; 4],
        filter: &Shape,
        strides: Strides,
        padding: ConvPadding,
    ) -> KernelResult<Self> {
        let [batch, in_h, in_w, in_depth] = input;
        let Some([filter_h, filter_w, filter_in, out_depth]) = filter.as_nhwc() else {
            return Err(KernelError::shape_mismatch(format!(
                "conv2d expects a rank-4 HWIO filter, got {:?}",
                filter.dims()
            )));
        };
        if filter_in != in_depth {
            return Err(KernelError::shape_mismatch(format!(
                "conv2d filter input depth ({filter_in}) does not match input depth ({in_depth})"
            )));
        }
        if out_depth == 0 {
            return Err(KernelError::shape_mismatch("conv2d filter has zero output depth"));
        }
        let out_h = padding.output_size(in_h, filter_h, strides.h)?;
        let out_w = padding.output_size(in_w, filter_w, strides.w)?;
        let pad_top = padding.pad_before(in_h, filter_h, strides.h)?;
        let pad_left = padding.pad_before(in_w, filter_w, strides.w)?;
        Ok(Conv2dGeometry {
            batch,
            in_h,
            in_w,
            in_depth,
            filter_h,
            filter_w,
            out_depth,
            out_h,
            out_w,
            pad_top,
            pad_left,
            strides,
        })
    }

    pub fn output_shape(&self) -> Shape {
        Shape::new(vec![self.batch, self.out_h, self.out_w, self.out_depth])
    }

    pub fn output_len(&self) -> KernelResult<usize> {
        self.batch
            .checked_mul(self.out_h)
            .and_then(|v| v.checked_mul(self.out_w))
            .and_then(|v| v.checked_mul(self.out_depth))
            .ok_or_else(|| KernelError::invalid_argument("conv2d output size overflow"))
    }

    /// Input row read by filter row `kh` for output row `oy`, or `None` in the zero border.
    #[inline]
    pub fn input_row(&self, oy: usize, kh: usize) -> Option<usize> {
        let y = (oy * self.strides.h + kh) as isize - self.pad_top as isize;
        (y >= 0 && (y as usize) < self.in_h).then_some(y as usize)
    }

    /// Input column read by filter column `kw` for output column `ox`.
    #[inline]
    pub fn input_col(&self, ox: usize, kw: usize) -> Option<usize> {
        let x = (ox * self.strides.w + kw) as isize - self.pad_left as isize;
        (x >= 0 && (x as usize) < self.in_w).then_some(x as usize)
    }
}
