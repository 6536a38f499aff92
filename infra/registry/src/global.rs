//! Process-wide registry slot.
//!
//! Prefer passing a [`SharedRegistry`] to whatever needs it. This slot exists
//! for call sites that cannot be handed one (deep helpers, plugins).
//!
//! Rules:
//! * [`init`] succeeds once per process; later calls fail with
//!   [`RegistryError::AlreadyInitialized`] and leave the active handle untouched.
//! * Readers ([`active`], [`register`], [`deregister`]) never mutate the slot.
//! * [`close`] releases the backend's resources but the slot stays occupied:
//!   the process is expected to exit shortly after.

use crate::{Instance, Registry, RegistryError, SharedRegistry};
use std::sync::OnceLock;
use tracing::info;

static ACTIVE: OnceLock<SharedRegistry> = OnceLock::new();

/// Activates `registry` for the rest of the process lifetime.
///
/// # Errors
/// [`RegistryError::AlreadyInitialized`] if a registry was activated before.
pub fn init(registry: SharedRegistry) -> Result<(), RegistryError> {
    let backend = registry.backend();
    ACTIVE.set(registry).map_err(|_| RegistryError::AlreadyInitialized {
        context: Some(format!("refused to replace with a `{backend}` registry").into()),
    })?;
    info!(backend, "Activated process-wide registry");
    Ok(())
}

/// The active registry, if [`init`] was called.
#[must_use]
pub fn active() -> Option<SharedRegistry> {
    ACTIVE.get().cloned()
}

#[must_use]
pub fn initialized() -> bool {
    ACTIVE.get().is_some()
}

/// Registers `instance` with the active registry.
///
/// # Errors
/// [`RegistryError::NotInitialized`] without an active registry, otherwise
/// whatever the backend reports.
pub async fn register(instance: &Instance) -> Result<(), RegistryError> {
    current()?.register(instance).await
}

/// Deregisters `instance` from the active registry.
///
/// # Errors
/// [`RegistryError::NotInitialized`] without an active registry, otherwise
/// whatever the backend reports.
pub async fn deregister(instance: &Instance) -> Result<(), RegistryError> {
    current()?.deregister(instance).await
}

/// Closes the active registry's backend. A no-op without one.
///
/// # Errors
/// Whatever the backend reports while closing.
pub async fn close() -> Result<(), RegistryError> {
    match ACTIVE.get() {
        Some(registry) => registry.close().await,
        None => Ok(()),
    }
}

fn current() -> Result<&'static dyn Registry, RegistryError> {
    ACTIVE
        .get()
        .map(|registry| &**registry)
        .ok_or_else(|| RegistryError::NotInitialized { context: None })
}
