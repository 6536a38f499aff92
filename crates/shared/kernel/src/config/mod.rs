use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Prefix of environment overrides, e.g. `QUANX__PORT__HTTP=9000`.
pub const ENV_PREFIX: &str = "QUANX";
/// Nesting separator inside environment keys.
pub const ENV_SEPARATOR: &str = "__";
/// File stem looked up when no path is given (`server.toml`, `server.yaml`, ...).
pub const DEFAULT_CONFIG_PATH: &str = "server";

#[quanx_derive::quanx_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },

    #[error("Invalid config{}: {message}", format_context(.context))]
    Invalid { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

/// Loads `T` from a configuration file layered with environment overrides.
///
/// 1. **File**: `path` (default `"server"`). Without an extension every format
///    the `config` crate knows is tried (`server.toml`, `server.yaml`, ...).
///    The file is required.
/// 2. **Environment**: variables prefixed with `QUANX__`; nested keys use `__`
///    (`QUANX__PORT__HTTP` maps to `port.http`).
///
/// Fields missing from both layers take the `serde` defaults of `T`.
///
/// # Errors
/// Returns [`ConfigError::Config`] when the file cannot be found or parsed, or
/// when the merged values do not deserialize into `T`.
pub fn load_config<T>(path: Option<impl AsRef<Path>>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    load(&effective_path(path), true)
}

/// Same as [`load_config`] but a missing file is not an error: only the
/// environment and `serde` defaults contribute then.
///
/// # Errors
/// Returns [`ConfigError::Config`] when a present file is malformed or the
/// values do not deserialize into `T`.
pub fn load_optional_config<T>(path: Option<impl AsRef<Path>>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    load(&effective_path(path), false)
}

fn effective_path(path: Option<impl AsRef<Path>>) -> PathBuf {
    path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), |p| p.as_ref().to_path_buf())
}

fn load<T: DeserializeOwned>(path: &Path, required: bool) -> Result<T, ConfigError> {
    let builder = Config::builder()
        .add_source(File::from(path).required(required))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .convert_case(config::Case::Snake),
        );

    if required {
        info!(path = %path.display(), "Loading config");
    } else {
        debug!(path = %path.display(), "Loading optional config");
    }

    builder
        .build()
        .context(format!("Failed to build config from {}", path.display()))?
        .try_deserialize::<T>()
        .context(format!("Failed to deserialize config from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quanx_domain::ServerConfig;
    use quanx_domain::config::{DEFAULT_NAME, GRPC};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn loads_yaml_by_stem() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("server.yaml"),
            "name: orders\nhost: 10.0.0.5\nport:\n  http: 9000\n  grpc: 50051\n",
        )?;

        let cfg: ServerConfig = load_config(Some(dir.path().join("server")))?;
        assert_eq!(cfg.name(), "orders");
        assert_eq!(cfg.host(), "10.0.0.5");
        assert_eq!(cfg.port(), 9000);
        assert_eq!(cfg.port_of(GRPC), Some(50051));
        Ok(())
    }

    #[test]
    fn loads_toml_with_defaults_for_missing_fields() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let file = dir.path().join("svc.toml");
        fs::write(&file, "host = \"10.0.0.9\"\n")?;

        let cfg: ServerConfig = load_config(Some(&file))?;
        assert_eq!(cfg.name(), DEFAULT_NAME);
        assert_eq!(cfg.host(), "10.0.0.9");
        assert_eq!(cfg.port(), 8888);
        Ok(())
    }

    #[test]
    fn missing_required_file_fails() {
        let dir = tempdir().unwrap();
        let res = load_config::<ServerConfig>(Some(dir.path().join("absent")));
        assert!(matches!(res, Err(ConfigError::Config { context: Some(_), .. })));
    }

    #[test]
    fn missing_optional_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let cfg: ServerConfig = load_optional_config(Some(dir.path().join("absent"))).unwrap();
        assert_eq!(cfg.name(), DEFAULT_NAME);
    }

    #[test]
    fn malformed_file_fails() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("bad.toml");
        fs::write(&file, "port = \"not a map\"\n").unwrap();
        assert!(load_config::<ServerConfig>(Some(&file)).is_err());
    }
}
