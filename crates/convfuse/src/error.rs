//! Error type shared by the tensor, attribute and kernel layers.

use thiserror::Error;

use crate::tensor::DType;

/// Failure raised while validating or executing a kernel.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KernelError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Attribute validation failed while constructing an op.
    #[error("invalid attribute `{attr}`: {reason}")]
    InvalidAttribute { attr: String, reason: String },
    #[error("dtype mismatch: expected {expected}, got {actual}")]
    DTypeMismatch { expected: DType, actual: DType },
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("{op} is not implemented: {reason}")]
    Unimplemented { op: String, reason: String },
    /// The execution context was never registered with a backend registry.
    #[error("backend misconfigured: {0}")]
    BackendMisconfigured(String),
    #[error("thread pool construction failed: {0}")]
    ThreadPool(String),
}

impl KernelError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        KernelError::InvalidArgument(message.into())
    }

    pub fn invalid_attribute(attr: impl Into<String>, reason: impl Into<String>) -> Self {
        KernelError::InvalidAttribute {
            attr: attr.into(),
            reason: reason.into(),
        }
    }

    pub fn shape_mismatch(message: impl Into<String>) -> Self {
        KernelError::ShapeMismatch(message.into())
    }

    pub fn unimplemented(op: impl Into<String>, reason: impl Into<String>) -> Self {
        KernelError::Unimplemented {
            op: op.into(),
            reason: reason.into(),
        }
    }

    /// Fatal errors invalidate every later computation on the same process state.
    pub fn is_fatal(&self) -> bool {
        matches!(self, KernelError::BackendMisconfigured(_))
    }
}

pub type KernelResult<T> = Result<T, KernelError>;
