//! Bilinear resize geometry shared by the reference resize and the fused prologue.

use std::fmt;

use crate::error::{KernelError, KernelResult};

/// Target spatial size of a resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResizeSize {
    pub height: usize,
    pub width: usize,
}

impl ResizeSize {
    pub fn new(height: usize, width: usize) -> KernelResult<Self> {
        if height == 0 || width == 0 {
            return Err(KernelError::invalid_argument(format!(
                "resize size must be positive, got {height}x{width}"
            )));
        }
        Ok(ResizeSize { height, width })
    }
}

impl fmt::Display for ResizeSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.height, self.width)
    }
}

/// Source-to-target scale along one axis.
pub fn resize_scale(in_size: usize, out_size: usize, align_corners: bool) -> f32 {
    if align_corners && out_size > 1 {
        (in_size - 1) as f32 / (out_size - 1) as f32
    } else {
        in_size as f32 / out_size as f32
    }
}

/// Neighbours and blend weight of one output coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interpolation {
    pub lower: usize,
    pub upper: usize,
    pub lerp: f32,
}

/// Computes the interpolation for every output coordinate of one axis.
pub fn interpolation_weights(
    in_size: usize,
    out_size: usize,
    align_corners: bool,
) -> Vec<Interpolation> {
    let scale = resize_scale(in_size, out_size, align_corners);
    let last = in_size.saturating_sub(1);
    (0..out_size)
        .map(|i| {
            let source = i as f32 * scale;
            let floor = source.floor();
            let lower = (floor as usize).min(last);
            Interpolation {
                lower,
                upper: (lower + 1).min(last),
                lerp: source - floor,
            }
        })
        .collect()
}

/// Blends four neighbours: along x first, then along y.
#[inline]
pub fn bilinear(
    top_left: f32,
    top_right: f32,
    bottom_left: f32,
    bottom_right: f32,
    x_lerp: f32,
    y_lerp: f32,
) -> f32 {
    let top = top_left + (top_right - top_left) * x_lerp;
    let bottom = bottom_left + (bottom_right - bottom_left) * x_lerp;
    top + (bottom - top) * y_lerp
}
