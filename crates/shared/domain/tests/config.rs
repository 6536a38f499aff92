use quanx_domain::config::{DEFAULT_HTTP_PORT, DEFAULT_NAME, GRPC, HTTP};
use quanx_domain::ServerConfig;
use serde_json::json;

#[test]
fn missing_fields_fall_back_to_defaults() {
    let cfg: ServerConfig = serde_json::from_value(json!({ "host": "10.1.1.1" })).unwrap();
    assert_eq!(cfg.name(), DEFAULT_NAME);
    assert_eq!(cfg.host(), "10.1.1.1");
    assert_eq!(cfg.port(), DEFAULT_HTTP_PORT);
    assert!(cfg.is_valid());
}

#[test]
fn explicit_port_map_replaces_default_map() {
    let cfg: ServerConfig =
        serde_json::from_value(json!({ "name": "svc", "port": { "grpc": 50051 } })).unwrap();
    assert_eq!(cfg.port_of(GRPC), Some(50051));
    assert_eq!(cfg.port_of(HTTP), None);
}

#[test]
fn layered_defaults_file_then_explicit() {
    let file: ServerConfig =
        serde_json::from_value(json!({ "name": "orders", "port": { "http": 9000 } })).unwrap();
    let explicit = ServerConfig::empty().with_host("10.0.0.5").with_port(GRPC, 50051);

    let merged = ServerConfig::default().covered_by(&file).covered_by(&explicit);

    assert_eq!(merged.name(), "orders");
    assert_eq!(merged.host(), "10.0.0.5");
    assert_eq!(merged.port(), 9000);
    assert_eq!(merged.port_of(GRPC), Some(50051));
}
