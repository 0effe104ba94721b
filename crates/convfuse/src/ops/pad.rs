//! Mirror padding modes and NHWC padding amounts.

use std::fmt;
use std::str::FromStr;

use crate::error::{KernelError, KernelResult};

/// Border extension by reflecting existing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MirrorPadMode {
    /// Mirror excluding the edge value: `[1, 2, 3]` padded by 2 gives `[3, 2, 1, 2, 3, 2, 1]`.
    Reflect,
    /// Mirror including the edge value: `[1, 2, 3]` padded by 2 gives `[2, 1, 1, 2, 3, 3, 2]`.
    Symmetric,
}

impl MirrorPadMode {
    pub fn as_str(self) -> &'static str {
        match self {
            MirrorPadMode::Reflect => "REFLECT",
            MirrorPadMode::Symmetric => "SYMMETRIC",
        }
    }

    /// 1 when the edge value is skipped while mirroring.
    pub fn offset(self) -> usize {
        match self {
            MirrorPadMode::Reflect => 1,
            MirrorPadMode::Symmetric => 0,
        }
    }

    /// Largest padding this mode admits along an axis of length `dim`.
    pub fn max_padding(self, dim: usize) -> usize {
        dim.saturating_sub(self.offset())
    }

    /// Maps a coordinate of the padded axis back to the source axis.
    ///
    /// Callers must have validated the padding against [`MirrorPadMode::max_padding`].
    #[inline]
    pub fn source_index(self, padded: usize, pad_before: usize, dim: usize) -> usize {
        let offset = self.offset() as isize;
        let dim = dim as isize;
        let p = padded as isize - pad_before as isize;
        let src = if p < 0 {
            -p - 1 + offset
        } else if p >= dim {
            2 * dim - p - 1 - offset
        } else {
            p
        };
        src as usize
    }
}

impl fmt::Display for MirrorPadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MirrorPadMode {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REFLECT" => Ok(MirrorPadMode::Reflect),
            "SYMMETRIC" => Ok(MirrorPadMode::Symmetric),
            other => Err(KernelError::invalid_attribute(
                "mode",
                format!("expected REFLECT or SYMMETRIC, got `{other}`"),
            )),
        }
    }
}

/// `(before, after)` padding for each NHWC dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Paddings(pub [[usize; 2]; 4]);

impl Paddings {
    pub fn zero() -> Self {
        Paddings([[0; 2]; 4])
    }

    /// Pads height by `y` and width by `x` on both sides.
    pub fn spatial(y: usize, x: usize) -> Self {
        Paddings([[0, 0], [y, y], [x, x], [0, 0]])
    }

    pub fn dim(&self, axis: usize) -> [usize; 2] {
        self.0[axis]
    }

    /// Dimensions after padding `dims`.
    pub fn padded_dims(&self, dims: [usize; 4]) -> [usize; 4] {
        let mut out = dims;
        for (axis, d) in out.iter_mut().enumerate() {
            *d += self.0[axis][0] + self.0[axis][1];
        }
        out
    }

    /// Checks every padding against the limit `mode` imposes on `dims`.
    pub fn validate_mirror(&self, dims: [usize; 4], mode: MirrorPadMode) -> KernelResult<()> {
        for (axis, &dim) in dims.iter().enumerate() {
            let [before, after] = self.0[axis];
            let limit = mode.max_padding(dim);
            if before > limit || after > limit {
                return Err(KernelError::invalid_argument(format!(
                    "{mode} paddings ({before}, {after}) exceed the limit {limit} for dimension {axis} of size {dim}"
                )));
            }
        }
        Ok(())
    }

    /// The fused kernels only pad spatially.
    pub fn validate_spatial_only(&self) -> KernelResult<()> {
        if self.0[0] != [0, 0] || self.0[3] != [0, 0] {
            return Err(KernelError::invalid_argument(
                "paddings in the batch and depth dimensions must be zero",
            ));
        }
        Ok(())
    }
}
