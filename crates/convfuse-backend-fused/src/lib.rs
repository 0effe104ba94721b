//! Fused convolution kernels.
//!
//! Each kernel is an op object: construction validates the graph attributes and `compute`
//! runs on the thread pool of a [`convfuse::CpuBackendContext`]. Intermediates are rounded
//! to the element type at exactly the points where the unfused chain materializes them.

mod conv;
mod kernel;
mod resize_pad;

pub use conv::{FusedConv2D, FusedConv2dAttrs};
pub use resize_pad::{
    FusedPadAttrs, FusedPadConv2D, FusedResizeAndPadConv2D, FusedResizePadAttrs,
};
