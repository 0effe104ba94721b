//! Kernel attributes shared by the reference primitives and the fused kernels.

pub mod activation;
pub mod conv;
pub mod pad;
pub mod resize;

pub use activation::Activation;
pub use conv::{Conv2dGeometry, ConvPadding, Strides};
pub use pad::{MirrorPadMode, Paddings};
pub use resize::{bilinear, interpolation_weights, resize_scale, Interpolation, ResizeSize};
