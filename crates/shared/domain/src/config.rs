use crate::instance::Instance;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Port map key of HTTP listeners.
pub const HTTP: &str = "http";
/// Port map key of gRPC listeners.
pub const GRPC: &str = "grpc";

pub const DEFAULT_NAME: &str = "quanx-server";
pub const DEFAULT_HTTP_PORT: u16 = 8888;

/// Runtime configuration of one service process.
///
/// Values are layered: defaults, then the loaded file/environment, then
/// whatever the caller hands to the engine. Each layer only needs the fields it
/// wants to change, see [`ServerConfig::cover`].
///
/// An empty `host` means "this machine": the engine fills it with the local
/// address before validating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
    pub host: String,
    /// Service type tag (`"http"`, `"grpc"`, ...) to listening port.
    pub port: BTreeMap<String, u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_owned(),
            host: String::new(),
            port: BTreeMap::from([(HTTP.to_owned(), DEFAULT_HTTP_PORT)]),
        }
    }
}

impl ServerConfig {
    /// A config with every field empty, meant as an override layer.
    #[must_use]
    pub const fn empty() -> Self {
        Self { name: String::new(), host: String::new(), port: BTreeMap::new() }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub fn with_port(mut self, kind: impl Into<String>, port: u16) -> Self {
        self.port.insert(kind.into(), port);
        self
    }

    /// `name`, `host` and at least one port are set.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() && !self.host.is_empty() && !self.port.is_empty()
    }

    /// Overlays `other` onto `self`.
    ///
    /// Scalar fields are replaced only when `other` has a non-empty value. Port
    /// maps are merged key-wise: the result holds the union of both key sets,
    /// and `other` wins when a key is present in both.
    pub fn cover(&mut self, other: &Self) {
        if !other.name.is_empty() {
            self.name.clone_from(&other.name);
        }
        if !other.host.is_empty() {
            self.host.clone_from(&other.host);
        }
        for (kind, port) in &other.port {
            self.port.insert(kind.clone(), *port);
        }
    }

    /// Consuming form of [`ServerConfig::cover`].
    #[must_use]
    pub fn covered_by(mut self, other: &Self) -> Self {
        self.cover(other);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configured host, possibly empty. See [`ServerConfig::resolve_host`].
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the host, filling it with `resolve()` first when it is empty.
    ///
    /// This writes to `self`: the resolved value is stored so later calls and
    /// [`ServerConfig::host`] return the same address without resolving again.
    pub fn resolve_host(&mut self, resolve: impl FnOnce() -> String) -> &str {
        if self.host.is_empty() {
            self.host = resolve();
        }
        &self.host
    }

    /// The HTTP port, or `0` when none is configured.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port_of(HTTP).unwrap_or(0)
    }

    #[must_use]
    pub fn port_of(&self, kind: &str) -> Option<u16> {
        self.port.get(kind).copied().filter(|port| *port > 0)
    }

    /// The instance this process announces to a registry: its HTTP endpoint.
    ///
    /// `None` while the host is unresolved or no HTTP port is configured.
    #[must_use]
    pub fn instance(&self) -> Option<Instance> {
        let port = self.port_of(HTTP)?;
        if self.name.is_empty() || self.host.is_empty() {
            return None;
        }
        Some(Instance::new(&self.name, &self.host, port))
    }
}
