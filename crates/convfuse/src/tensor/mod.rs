//! Host tensors, dtypes, shapes and the element capability the kernels are generic over.

pub mod dtype;
mod element;
mod host_tensor;
pub mod shape;

pub use dtype::DType;
pub use element::Element;
pub use half::f16;
pub use host_tensor::{Tensor, TensorData};
pub use shape::Shape;
