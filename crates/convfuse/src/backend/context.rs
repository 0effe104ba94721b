//! Execution contexts and the CPU compute context lent to kernels.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::env;
use crate::error::{KernelError, KernelResult};

/// Identity of one execution session.
pub type ContextId = u64;

/// Thread hint meaning "let the backend decide".
pub const NO_THREAD_HINT: i32 = -1;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Session-level state handed to kernels: an identity plus the recommended thread count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    id: ContextId,
    recommended_num_threads: i32,
}

impl ExecutionContext {
    /// Creates a context with a fresh id and no thread hint.
    pub fn new() -> Self {
        Self::with_recommended_threads(NO_THREAD_HINT)
    }

    pub fn with_recommended_threads(recommended_num_threads: i32) -> Self {
        ExecutionContext {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            recommended_num_threads,
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn recommended_num_threads(&self) -> i32 {
        self.recommended_num_threads
    }

    /// The hint as a thread count, when it is positive.
    pub fn thread_hint(&self) -> Option<usize> {
        (self.recommended_num_threads > 0).then_some(self.recommended_num_threads as usize)
    }

    /// Thread count a backend built for this context should use.
    pub fn resolved_num_threads(&self) -> usize {
        self.thread_hint()
            .or_else(env::num_threads_override)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute resources shared by every kernel run under one execution context.
pub struct CpuBackendContext {
    pool: rayon::ThreadPool,
    max_num_threads: usize,
}

impl CpuBackendContext {
    pub fn new(num_threads: usize) -> KernelResult<Self> {
        let num_threads = num_threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|idx| format!("convfuse-cpu-{idx}"))
            .build()
            .map_err(|err| KernelError::ThreadPool(err.to_string()))?;
        Ok(CpuBackendContext {
            pool,
            max_num_threads: num_threads,
        })
    }

    pub fn max_num_threads(&self) -> usize {
        self.max_num_threads
    }

    /// Runs `f` inside the context's thread pool.
    pub fn install<R, F>(&self, f: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        self.pool.install(f)
    }
}

impl fmt::Debug for CpuBackendContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuBackendContext")
            .field("max_num_threads", &self.max_num_threads)
            .finish()
    }
}

/// Registration slot holding the lazily constructed [`CpuBackendContext`].
#[derive(Default)]
pub struct ExternalCpuBackendContext {
    backend: OnceCell<Arc<CpuBackendContext>>,
}

impl ExternalCpuBackendContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the backend, constructing it on first use.
    ///
    /// Concurrent first callers block until one of them has built the backend and then
    /// all observe that instance.
    pub fn get_or_init(
        &self,
        context: &ExecutionContext,
    ) -> KernelResult<Arc<CpuBackendContext>> {
        self.backend
            .get_or_try_init(|| {
                let num_threads = context.resolved_num_threads();
                tracing::debug!(
                    context = context.id(),
                    hint = context.recommended_num_threads(),
                    num_threads,
                    "constructing cpu backend context"
                );
                CpuBackendContext::new(num_threads).map(Arc::new)
            })
            .map(Arc::clone)
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.get().is_some()
    }
}
