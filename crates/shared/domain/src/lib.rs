//! # Domain Models
//!
//! Plain data shared by the engine, the registry backends and the servers.
//! No I/O and no networking here: host resolution and config loading live in
//! `quanx-kernel`.

pub mod config;
pub mod instance;

pub use config::ServerConfig;
pub use instance::Instance;
