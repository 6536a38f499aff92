use quanx_domain::{Instance, ServerConfig};
use quanx_engine::{Engine, EngineState, Server};
use quanx_registry::Registry;
use quanx_registry::memory::InMemoryRegistry;
use quanx_server::HttpServer;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::{Duration, Instant};

fn local(port: u16) -> ServerConfig {
    ServerConfig::empty().with_name("orders").with_host("127.0.0.1").with_port("http", port)
}

#[tokio::test]
async fn serves_health_and_discovery_while_the_engine_runs() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.register(&Instance::new("billing", "10.0.0.7", 8080)).await.unwrap();

    let http = Arc::new(HttpServer::new().with_registry(registry.clone()));
    let engine = Engine::builder()
        .loader(|| Ok::<_, quanx_engine::ConfigError>(local(0)))
        .server(Arc::clone(&http))
        .build();

    let (stop, stopped) = oneshot::channel::<()>();
    let runner = engine.clone();
    let run = tokio::spawn(async move {
        runner
            .run_until(async {
                let _ = stopped.await;
            })
            .await
    });
    engine.subscribe().wait_for(|state| *state == EngineState::Running).await.unwrap();

    let addr = http.local_addr().expect("server should be listening");
    assert_ne!(addr.port(), 0);
    let base = format!("http://{addr}");

    let health: Value = reqwest::get(format!("{base}/health")).await.unwrap().json().await.unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["name"], "orders");
    assert_eq!(health["host"], "127.0.0.1");

    let found: Vec<Instance> =
        reqwest::get(format!("{base}/discovery/billing")).await.unwrap().json().await.unwrap();
    assert_eq!(found, vec![Instance::new("billing", "10.0.0.7", 8080)]);

    let none: Vec<Instance> =
        reqwest::get(format!("{base}/discovery/nobody")).await.unwrap().json().await.unwrap();
    assert!(none.is_empty());

    stop.send(()).unwrap();
    let report = run.await.unwrap().unwrap();
    assert!(report.is_clean(), "{report:?}");
    assert!(http.local_addr().is_none());
    assert!(reqwest::get(format!("{base}/health")).await.is_err());
}

#[tokio::test]
async fn discovery_without_registry_is_unavailable() {
    let http = HttpServer::new().with_name("plain");
    http.start(&local(0)).await.unwrap();
    let addr = http.local_addr().unwrap();

    let response = reqwest::get(format!("http://{addr}/discovery/billing")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

    http.shutdown(Instant::now() + Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn occupied_port_fails_to_start() {
    let first = HttpServer::new();
    first.start(&local(0)).await.unwrap();
    let taken = first.local_addr().unwrap().port();

    let second = HttpServer::new().with_name("second");
    let err = second.start(&local(taken)).await.unwrap_err();
    assert!(err.to_string().contains("127.0.0.1"), "{err}");
    assert!(second.local_addr().is_none());
    second.shutdown(Instant::now() + Duration::from_secs(1)).await.unwrap();

    first.shutdown(Instant::now() + Duration::from_secs(5)).await.unwrap();
}
