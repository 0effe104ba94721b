//! Explicit registry lending CPU backend contexts to execution contexts.
//!
//! A context must be registered before kernels can borrow its backend; the backend itself
//! is built lazily on the first [`BackendContextRegistry::get_or_create`] call and dropped
//! when the context is unregistered and the last borrower releases it.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::context::{ContextId, CpuBackendContext, ExecutionContext, ExternalCpuBackendContext};
use crate::error::{KernelError, KernelResult};

#[derive(Default)]
pub struct BackendContextRegistry {
    contexts: RwLock<HashMap<ContextId, Arc<ExternalCpuBackendContext>>>,
}

impl BackendContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `context`. Returns `false` when it was already registered.
    pub fn register(&self, context: &ExecutionContext) -> bool {
        let mut contexts = self.contexts.write().unwrap_or_else(PoisonError::into_inner);
        if contexts.contains_key(&context.id()) {
            return false;
        }
        contexts.insert(context.id(), Arc::new(ExternalCpuBackendContext::new()));
        tracing::debug!(context = context.id(), "registered execution context");
        true
    }

    /// Tears down the registration of `id`. Returns `false` when nothing was registered.
    pub fn unregister(&self, id: ContextId) -> bool {
        let removed = self
            .contexts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some();
        if removed {
            tracing::debug!(context = id, "unregistered execution context");
        }
        removed
    }

    pub fn is_registered(&self, id: ContextId) -> bool {
        self.contexts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    /// Whether the backend of `id` has been built. `false` for unregistered contexts.
    pub fn is_initialized(&self, id: ContextId) -> bool {
        self.contexts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .is_some_and(|slot| slot.is_initialized())
    }

    pub fn len(&self) -> usize {
        self.contexts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the backend of `context`, building it on first use.
    ///
    /// Repeated calls return the same instance. An unregistered context yields
    /// [`KernelError::BackendMisconfigured`], which callers must treat as fatal.
    pub fn get_or_create(
        &self,
        context: &ExecutionContext,
    ) -> KernelResult<Arc<CpuBackendContext>> {
        let slot = self
            .contexts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&context.id())
            .cloned();
        let Some(slot) = slot else {
            tracing::error!(
                context = context.id(),
                "execution context has no backend registration"
            );
            return Err(KernelError::BackendMisconfigured(format!(
                "execution context {} was not registered with the backend registry",
                context.id()
            )));
        };
        slot.get_or_init(context)
    }
}
