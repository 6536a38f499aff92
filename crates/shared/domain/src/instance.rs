use serde::{Deserialize, Serialize};
use std::fmt;

/// A reachable endpoint of a named service, as stored in a registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl Instance {
    /// Builds an instance with the id `"{host}#{port}#{name}"`.
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        let name = name.into();
        let host = host.into();
        Self { id: format!("{host}#{port}#{name}"), name, host, port }
    }

    /// Replaces the generated id, e.g. with the one a backend assigned.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Base URL of the instance, `http://{host}:{port}`.
    #[must_use]
    pub fn domain(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Whether `other` points at the same service endpoint, ignoring ids.
    #[must_use]
    pub fn same_endpoint(&self, other: &Self) -> bool {
        self.name == other.name && self.host == other.host && self.port == other.port
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.name, self.host, self.port)
    }
}
