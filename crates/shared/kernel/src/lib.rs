//! Runtime helpers shared by the engine and the applications.
//!
//! ## Config loading
//! ```rust,no_run
//! use quanx_kernel::config::load_config;
//! use quanx_kernel::domain::ServerConfig;
//!
//! let cfg: ServerConfig = load_config(Some("server")).unwrap_or_default();
//! ```
//!
//! ## Defaults
//! [`default_config`] is [`ServerConfig::default`] with the host already
//! resolved to this machine's address, so it validates as-is.

pub mod config;
pub mod net;

pub use quanx_domain as domain;

use quanx_domain::ServerConfig;

/// Default service configuration with an eagerly resolved host.
#[must_use]
pub fn default_config() -> ServerConfig {
    ServerConfig::default().with_host(net::local_ip())
}
