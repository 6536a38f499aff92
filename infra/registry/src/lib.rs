//! # Registry
//!
//! Service discovery behind one small trait.
//!
//! A [`Registry`] announces running instances to a naming backend and looks
//! up the healthy instances of other services. Two backends ship with the crate:
//!
//! * [`memory::InMemoryRegistry`]: process-local and synchronous, for tests and
//!   single-node setups.
//! * [`nacos::NacosRegistry`]: a Nacos naming service, scoped to one group, with
//!   ephemeral (heartbeat-bound) registrations.
//!
//! Handles are explicit: build one, share it as [`SharedRegistry`], and call
//! [`Registry::close`] when the process is done with it. For code that cannot
//! be handed a handle, [`global`] offers a set-once process-wide slot.
//!
//! ## Example
//!
//! ```rust
//! use quanx_domain::Instance;
//! use quanx_registry::{Registry, memory::InMemoryRegistry};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), quanx_registry::RegistryError> {
//! let registry = InMemoryRegistry::new();
//! registry.register(&Instance::new("orders", "10.0.0.5", 8080)).await?;
//!
//! let picked = registry.select_one("orders").await?;
//! assert_eq!(picked.port, 8080);
//! # Ok(())
//! # }
//! ```

mod error;
pub mod global;
pub mod memory;
pub mod nacos;

pub use crate::error::{BoxError, RegistryError, RegistryErrorExt};
pub use quanx_domain::Instance;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Shared, type-erased registry handle.
pub type SharedRegistry = Arc<dyn Registry>;

/// A naming backend: register, deregister and look up service instances.
#[async_trait]
pub trait Registry: Send + Sync + fmt::Debug {
    /// Short backend name used in logs (`"nacos"`, `"memory"`).
    fn backend(&self) -> &'static str;

    /// Announces `instance` as a healthy endpoint of `instance.name`.
    async fn register(&self, instance: &Instance) -> Result<(), RegistryError>;

    /// Withdraws a previously registered `instance`.
    async fn deregister(&self, instance: &Instance) -> Result<(), RegistryError>;

    /// One healthy instance of `service`. The pick is up to the backend.
    ///
    /// # Errors
    /// [`RegistryError::NoHealthyInstance`] when the service has none.
    async fn select_one(&self, service: &str) -> Result<Instance, RegistryError>;

    /// Every instance of `service` currently reported healthy; possibly empty.
    async fn select_all(&self, service: &str) -> Result<Vec<Instance>, RegistryError>;

    /// Releases backend resources (heartbeats, connections).
    ///
    /// The handle should not be used afterwards.
    async fn close(&self) -> Result<(), RegistryError> {
        Ok(())
    }
}
