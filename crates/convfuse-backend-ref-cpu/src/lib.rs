//! Single-threaded reference primitives.
//!
//! Every op here is a plain loop over the output with no blocking or threading, so the
//! fused kernels can be checked against a composition of these.

pub mod cpu;

pub use cpu::{activation, bias_add, cast, conv2d, mirror_pad, resize_bilinear};
