//! # Engine
//!
//! Lifecycle of a quanx service process.
//!
//! An [`Engine`] holds a set of [`Server`]s and a config. [`Engine::run`]:
//!
//! 1. resolves the config: the loaded one (file + `QUANX__` environment),
//!    covered by the explicit one, with the host filled in;
//! 2. starts every server in registration order, stopping at the first failure;
//! 3. registers the process with a registry, if there is one;
//! 4. waits for Ctrl+C or `SIGTERM`;
//! 5. deregisters, then stops every server in reverse order within a shared
//!    deadline, and reports what went wrong in a [`ShutdownReport`].
//!
//! ## Example
//!
//! ```no_run
//! use quanx_domain::ServerConfig;
//! use quanx_engine::{Engine, EngineError};
//!
//! # async fn example() -> Result<(), EngineError> {
//! let engine = Engine::builder()
//!     .config(ServerConfig::empty().with_name("orders").with_port("http", 9000))
//!     .build();
//!
//! let report = engine.run().await?;
//! assert!(report.is_clean());
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;
mod loader;
mod report;
mod server;
pub mod signal;

pub use crate::engine::{DEFAULT_SHUTDOWN_TIMEOUT, Engine, EngineBuilder, EngineState};
pub use crate::error::{EngineError, EngineErrorExt};
pub use crate::loader::{ConfigLoader, FileConfigLoader};
pub use crate::report::{ShutdownFailure, ShutdownReport};
pub use crate::server::{Server, SharedServer};
pub use quanx_kernel::config::ConfigError;
pub use quanx_registry::BoxError;
