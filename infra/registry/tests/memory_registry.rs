use quanx_registry::memory::InMemoryRegistry;
use quanx_registry::{Instance, Registry, RegistryError};

fn svc_a() -> Instance {
    Instance::new("svcA", "10.0.0.5", 8080).with_id("i1")
}

#[tokio::test]
async fn register_select_deregister() {
    let registry = InMemoryRegistry::new();
    registry.register(&svc_a()).await.unwrap();

    let all = registry.select_all("svcA").await.unwrap();
    assert_eq!(all, vec![svc_a()]);

    let one = registry.select_one("svcA").await.unwrap();
    assert_eq!(one.id, "i1");
    assert_eq!(one.domain(), "http://10.0.0.5:8080");

    registry.deregister(&svc_a()).await.unwrap();
    assert!(registry.select_all("svcA").await.unwrap().is_empty());
    assert!(registry.is_empty());
}

#[tokio::test]
async fn unknown_service_is_empty_not_an_error() {
    let registry = InMemoryRegistry::new();
    assert!(registry.select_all("nobody").await.unwrap().is_empty());
}

#[tokio::test]
async fn select_one_without_instances_reports_the_service() {
    let registry = InMemoryRegistry::new();
    let err = registry.select_one("svcA").await.unwrap_err();

    assert!(matches!(err, RegistryError::NoHealthyInstance { .. }));
    assert_eq!(err.service(), Some("svcA"));
}

#[tokio::test]
async fn select_one_only_returns_registered_instances() {
    let registry = InMemoryRegistry::new();
    let hosts = ["10.0.0.5", "10.0.0.6", "10.0.0.7"];
    for host in hosts {
        registry.register(&Instance::new("svcA", host, 8080)).await.unwrap();
    }
    registry.register(&Instance::new("svcB", "10.0.0.9", 9090)).await.unwrap();

    for _ in 0..50 {
        let picked = registry.select_one("svcA").await.unwrap();
        assert!(hosts.contains(&picked.host.as_str()));
        assert_eq!(picked.name, "svcA");
    }
    assert_eq!(registry.len(), 4);
}

#[tokio::test]
async fn deregistering_an_unknown_instance_is_a_no_op() {
    let registry = InMemoryRegistry::new();
    registry.register(&svc_a()).await.unwrap();

    registry.deregister(&Instance::new("svcA", "10.0.0.5", 9999)).await.unwrap();
    registry.deregister(&Instance::new("svcZ", "10.0.0.5", 8080)).await.unwrap();

    assert_eq!(registry.select_all("svcA").await.unwrap().len(), 1);
}
