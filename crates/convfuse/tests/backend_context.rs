use std::sync::{Arc, Barrier};
use std::thread;

use convfuse::backend::{BackendContextRegistry, ExecutionContext, NO_THREAD_HINT};
use convfuse::KernelError;

#[test]
fn get_or_create_is_idempotent() {
    let registry = BackendContextRegistry::new();
    let context = ExecutionContext::with_recommended_threads(2);
    assert!(registry.register(&context));
    assert!(!registry.register(&context));

    let first = registry.get_or_create(&context).unwrap();
    let second = registry.get_or_create(&context).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn contexts_get_distinct_backends() {
    let registry = BackendContextRegistry::new();
    let a = ExecutionContext::with_recommended_threads(1);
    let b = ExecutionContext::with_recommended_threads(1);
    assert_ne!(a.id(), b.id());
    registry.register(&a);
    registry.register(&b);
    let backend_a = registry.get_or_create(&a).unwrap();
    let backend_b = registry.get_or_create(&b).unwrap();
    assert!(!Arc::ptr_eq(&backend_a, &backend_b));
    assert_eq!(registry.len(), 2);
}

#[test]
fn unregistered_context_is_fatal() {
    let registry = BackendContextRegistry::new();
    let context = ExecutionContext::new();
    let err = registry.get_or_create(&context).unwrap_err();
    assert!(matches!(err, KernelError::BackendMisconfigured(_)));
    assert!(err.is_fatal());
}

#[test]
fn positive_hint_sets_thread_count() {
    let registry = BackendContextRegistry::new();
    let context = ExecutionContext::with_recommended_threads(3);
    registry.register(&context);
    let backend = registry.get_or_create(&context).unwrap();
    assert_eq!(backend.max_num_threads(), 3);
    assert_eq!(backend.install(rayon::current_num_threads), 3);
}

#[test]
fn missing_hint_falls_back_to_a_positive_default() {
    let context = ExecutionContext::with_recommended_threads(NO_THREAD_HINT);
    assert_eq!(context.thread_hint(), None);
    assert_eq!(ExecutionContext::with_recommended_threads(0).thread_hint(), None);
    assert!(context.resolved_num_threads() >= 1);
}

#[test]
fn concurrent_first_access_builds_one_backend() {
    let registry = Arc::new(BackendContextRegistry::new());
    let context = ExecutionContext::with_recommended_threads(2);
    registry.register(&context);
    assert!(!registry.is_initialized(context.id()));

    let workers = 8;
    let barrier = Arc::new(Barrier::new(workers));
    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            let context = context.clone();
            thread::spawn(move || {
                barrier.wait();
                registry.get_or_create(&context).unwrap()
            })
        })
        .collect();
    let backends: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for backend in &backends[1..] {
        assert!(Arc::ptr_eq(&backends[0], backend));
    }
    assert!(registry.is_initialized(context.id()));
}

#[test]
fn unregister_tears_down_the_registration() {
    let registry = BackendContextRegistry::new();
    let context = ExecutionContext::with_recommended_threads(1);
    registry.register(&context);
    assert!(!registry.is_initialized(context.id()));
    let backend = registry.get_or_create(&context).unwrap();
    assert!(registry.is_initialized(context.id()));

    assert!(registry.unregister(context.id()));
    assert!(!registry.is_initialized(context.id()));
    assert!(!registry.unregister(context.id()));
    assert!(!registry.is_registered(context.id()));
    assert!(registry.is_empty());
    assert!(registry.get_or_create(&context).is_err());
    // borrowers keep their handle alive
    assert_eq!(backend.max_num_threads(), 1);

    registry.register(&context);
    assert!(!registry.is_initialized(context.id()));
    let rebuilt = registry.get_or_create(&context).unwrap();
    assert!(!Arc::ptr_eq(&backend, &rebuilt));
}
