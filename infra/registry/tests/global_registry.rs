use quanx_registry::memory::InMemoryRegistry;
use quanx_registry::{Instance, Registry, RegistryError, global};
use std::sync::Arc;

// The slot is process-wide, so its whole lifecycle lives in one test.
#[tokio::test]
async fn slot_lifecycle() {
    let instance = Instance::new("svcA", "10.0.0.5", 8080);

    assert!(!global::initialized());
    assert!(global::active().is_none());
    assert!(matches!(global::register(&instance).await, Err(RegistryError::NotInitialized { .. })));
    global::close().await.unwrap();

    let memory = Arc::new(InMemoryRegistry::new());
    global::init(memory.clone()).unwrap();
    assert!(global::initialized());

    let err = global::init(Arc::new(InMemoryRegistry::new())).unwrap_err();
    assert!(matches!(err, RegistryError::AlreadyInitialized { context: Some(_) }));

    global::register(&instance).await.unwrap();
    assert_eq!(memory.len(), 1);

    let active = global::active().expect("slot should be filled");
    assert_eq!(active.backend(), "memory");
    assert_eq!(active.select_one("svcA").await.unwrap(), instance);

    global::deregister(&instance).await.unwrap();
    assert!(memory.is_empty());

    global::register(&instance).await.unwrap();
    global::close().await.unwrap();
    assert!(memory.is_empty());
    assert!(global::initialized());
}
