use quanx_engine::{ConfigLoader, Engine, EngineError, FileConfigLoader};
use std::fs;
use tempfile::tempdir;

#[test]
fn required_file_is_loaded_by_stem() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("server.toml"), "name = \"orders\"\n[port]\nhttp = 9100\n")?;

    let config = FileConfigLoader::new(dir.path().join("server")).load()?;
    assert_eq!(config.name(), "orders");
    assert_eq!(config.port(), 9100);
    Ok(())
}

#[test]
fn optional_file_may_be_missing() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("absent");

    assert!(FileConfigLoader::new(&path).load().is_err());
    let config = FileConfigLoader::optional(&path).load()?;
    assert_eq!(config.port(), 8888);
    Ok(())
}

#[tokio::test]
async fn missing_required_file_fails_the_run() {
    let dir = tempdir().unwrap();
    let engine = Engine::builder().loader(FileConfigLoader::new(dir.path().join("absent"))).build();

    let err = engine.run_until(async {}).await.unwrap_err();
    assert!(matches!(err, EngineError::ConfigLoad { .. }));
}
