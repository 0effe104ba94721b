//! CPU backend contexts and the registry that lends them to execution contexts.

pub mod context;
pub mod registry;

pub use context::{
    ContextId, CpuBackendContext, ExecutionContext, ExternalCpuBackendContext, NO_THREAD_HINT,
};
pub use registry::BackendContextRegistry;
