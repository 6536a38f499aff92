use crate::{EngineError, EngineErrorExt};
use quanx_domain::ServerConfig;
use quanx_kernel::config::{ConfigError, DEFAULT_CONFIG_PATH, load_config, load_optional_config};
use quanx_kernel::net::local_ip;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Source of the base configuration the engine resolves on every run.
///
/// Plain closures returning `Result<ServerConfig, ConfigError>` are loaders too.
pub trait ConfigLoader: Send + Sync {
    /// # Errors
    /// Whatever keeps the source from producing a config.
    fn load(&self) -> Result<ServerConfig, ConfigError>;
}

impl<F> ConfigLoader for F
where
    F: Fn() -> Result<ServerConfig, ConfigError> + Send + Sync,
{
    fn load(&self) -> Result<ServerConfig, ConfigError> {
        self()
    }
}

/// Loads [`ServerConfig`] from a file layered with `QUANX__` environment
/// overrides, see [`quanx_kernel::config::load_config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileConfigLoader {
    path: PathBuf,
    required: bool,
}

impl FileConfigLoader {
    /// A loader failing when the file is missing.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), required: true }
    }

    /// A loader falling back to environment and defaults when the file is missing.
    pub fn optional(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), required: false }
    }
}

impl Default for FileConfigLoader {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_PATH)
    }
}

impl ConfigLoader for FileConfigLoader {
    fn load(&self) -> Result<ServerConfig, ConfigError> {
        if self.required {
            load_config(Some(&self.path))
        } else {
            load_optional_config(Some(&self.path))
        }
    }
}

/// Merges the loaded config with the caller's one and fills in the host.
///
/// | loaded | explicit | result |
/// |---|---|---|
/// | `Ok(l)` | none | `l` |
/// | `Ok(l)` | `e` | `l` covered by `e` |
/// | `Err` | `e` | defaults covered by `e` |
/// | `Err` | none | [`EngineError::ConfigLoad`] |
///
/// An empty host becomes the local address. The result must be valid.
pub(crate) fn resolve(
    loaded: Result<ServerConfig, ConfigError>,
    explicit: Option<&ServerConfig>,
) -> Result<ServerConfig, EngineError> {
    let mut config = match (loaded, explicit) {
        (Ok(loaded), None) => loaded,
        (Ok(loaded), Some(explicit)) => loaded.covered_by(explicit),
        (Err(err), Some(explicit)) => {
            warn!(error = %err, "Config source failed, covering defaults with the explicit config");
            ServerConfig::default().covered_by(explicit)
        }
        (Err(err), None) => {
            return Err(err).context("no explicit config to fall back on");
        }
    };

    let host = config.resolve_host(local_ip);
    debug!(host, "Resolved server host");

    if !config.is_valid() {
        return Err(EngineError::ConfigInvalid {
            message: format!(
                "name, host and at least one port are required (name: {:?}, host: {:?}, ports: {})",
                config.name,
                config.host,
                config.port.len()
            )
            .into(),
            context: None,
        });
    }
    Ok(config)
}
