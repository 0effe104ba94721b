//! Core types for fused convolution kernels: host tensors, kernel attributes, fusion
//! specs and the CPU backend contexts kernels run on.

pub mod backend;
mod env;
pub mod error;
pub mod fusion;
pub mod ops;
pub mod tensor;

pub use backend::{BackendContextRegistry, CpuBackendContext, ExecutionContext};
pub use error::{KernelError, KernelResult};
pub use fusion::{FusedOp, FusionSpec};
pub use tensor::{DType, Element, Shape, Tensor, TensorData};
