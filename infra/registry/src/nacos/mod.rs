//! Nacos naming backend.
//!
//! [`NacosRegistry`] maps the [`Registry`] calls onto a [`NamingClient`] scoped
//! to one group. The bundled client, [`HttpNamingClient`], speaks the Nacos v2
//! open API over HTTP and keeps ephemeral registrations alive with heartbeats.

mod balancer;
mod error;
mod http;

pub use error::{NacosError, NacosErrorExt};
pub use http::{HttpNamingClient, NacosConfig};

use crate::{Instance, Registry, RegistryError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Group used when none is configured.
pub const DEFAULT_GROUP: &str = "DEFAULT_GROUP";
/// Cluster every registration lands in.
pub const DEFAULT_CLUSTER: &str = "DEFAULT";

/// Parameters of a naming-service registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInstanceParam {
    pub service_name: String,
    pub group_name: String,
    pub ip: String,
    pub port: u16,
    pub weight: f64,
    pub enabled: bool,
    pub healthy: bool,
    pub ephemeral: bool,
}

/// Parameters of a naming-service deregistration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeregisterInstanceParam {
    pub service_name: String,
    pub group_name: String,
    pub ip: String,
    pub port: u16,
    pub ephemeral: bool,
}

/// Parameters of an instance lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectParam {
    pub service_name: String,
    pub group_name: String,
}

/// An instance as the naming service reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NacosInstance {
    #[serde(default)]
    pub instance_id: String,
    pub ip: String,
    pub port: u16,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_true")]
    pub healthy: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub service_name: String,
}

const fn default_weight() -> f64 {
    1.0
}

const fn default_true() -> bool {
    true
}

impl NacosInstance {
    /// Converts to the crate's [`Instance`], naming it `service`.
    ///
    /// Nacos reports service names as `group@@service`; the group part is
    /// dropped. An empty `instanceId` falls back to the generated id.
    #[must_use]
    pub fn into_instance(self, service: &str) -> Instance {
        let name = match self.service_name.split_once("@@") {
            Some((_, name)) if !name.is_empty() => name.to_owned(),
            _ if self.service_name.is_empty() => service.to_owned(),
            _ => self.service_name,
        };
        let instance = Instance::new(name, self.ip, self.port);
        if self.instance_id.is_empty() { instance } else { instance.with_id(self.instance_id) }
    }
}

/// The naming-service calls [`NacosRegistry`] relies on.
///
/// Abstracted so the registry can be exercised without a Nacos server.
#[async_trait]
pub trait NamingClient: Send + Sync + fmt::Debug {
    async fn register_instance(&self, param: RegisterInstanceParam) -> Result<(), NacosError>;

    async fn deregister_instance(&self, param: DeregisterInstanceParam) -> Result<(), NacosError>;

    /// One healthy instance, weighted by the instances' weights.
    ///
    /// # Errors
    /// [`NacosError::NoHealthyInstance`] when none is healthy.
    async fn select_one_healthy_instance(&self, param: SelectParam) -> Result<NacosInstance, NacosError>;

    async fn select_instances(
        &self,
        param: SelectParam,
        healthy_only: bool,
    ) -> Result<Vec<NacosInstance>, NacosError>;

    /// Stops background work (heartbeats) and releases connections.
    async fn shutdown(&self) -> Result<(), NacosError> {
        Ok(())
    }
}

/// [`Registry`] backed by a Nacos naming service.
///
/// Every registration is ephemeral, enabled and healthy with weight `1.0`,
/// placed in this registry's group.
#[derive(Debug)]
pub struct NacosRegistry<C = HttpNamingClient> {
    group: String,
    client: C,
}

impl NacosRegistry<HttpNamingClient> {
    /// Builds an HTTP client from `config` and scopes it to `config.group`.
    ///
    /// # Errors
    /// [`NacosError::InvalidConfig`] or [`NacosError::Http`] if the client
    /// cannot be built.
    pub fn connect(config: NacosConfig) -> Result<Self, NacosError> {
        let group = config.group.clone();
        let client = HttpNamingClient::new(config)?;
        info!(group = %group, "Connected Nacos registry");
        Ok(Self::new(group, client))
    }
}

impl<C: NamingClient> NacosRegistry<C> {
    /// An empty `group` means [`DEFAULT_GROUP`].
    pub fn new(group: impl Into<String>, client: C) -> Self {
        let group = group.into();
        let group = if group.is_empty() { DEFAULT_GROUP.to_owned() } else { group };
        Self { group, client }
    }

    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    #[must_use]
    pub const fn client(&self) -> &C {
        &self.client
    }

    fn select_param(&self, service: &str) -> SelectParam {
        SelectParam { service_name: service.to_owned(), group_name: self.group.clone() }
    }
}

#[async_trait]
impl<C: NamingClient> Registry for NacosRegistry<C> {
    fn backend(&self) -> &'static str {
        "nacos"
    }

    async fn register(&self, instance: &Instance) -> Result<(), RegistryError> {
        let param = RegisterInstanceParam {
            service_name: instance.name.clone(),
            group_name: self.group.clone(),
            ip: instance.host.clone(),
            port: instance.port,
            weight: 1.0,
            enabled: true,
            healthy: true,
            ephemeral: true,
        };
        self.client.register_instance(param).await.map_err(|err| RegistryError::Register {
            service: instance.name.clone(),
            source: Box::new(err),
            context: Some(format!("group `{}`", self.group).into()),
        })?;
        info!(service = %instance.name, group = %self.group, instance = %instance, "Registered with Nacos");
        Ok(())
    }

    async fn deregister(&self, instance: &Instance) -> Result<(), RegistryError> {
        let param = DeregisterInstanceParam {
            service_name: instance.name.clone(),
            group_name: self.group.clone(),
            ip: instance.host.clone(),
            port: instance.port,
            ephemeral: true,
        };
        self.client.deregister_instance(param).await.map_err(|err| RegistryError::Deregister {
            service: instance.name.clone(),
            source: Box::new(err),
            context: Some(format!("group `{}`", self.group).into()),
        })?;
        info!(service = %instance.name, group = %self.group, instance = %instance, "Deregistered from Nacos");
        Ok(())
    }

    async fn select_one(&self, service: &str) -> Result<Instance, RegistryError> {
        match self.client.select_one_healthy_instance(self.select_param(service)).await {
            Ok(found) => {
                debug!(service, ip = %found.ip, port = found.port, "Selected Nacos instance");
                Ok(found.into_instance(service))
            }
            Err(NacosError::NoHealthyInstance { .. }) => Err(RegistryError::NoHealthyInstance {
                service: service.to_owned(),
                context: Some(format!("group `{}`", self.group).into()),
            }),
            Err(err) => Err(RegistryError::Select {
                service: service.to_owned(),
                source: Box::new(err),
                context: Some(format!("group `{}`", self.group).into()),
            }),
        }
    }

    async fn select_all(&self, service: &str) -> Result<Vec<Instance>, RegistryError> {
        let found = self
            .client
            .select_instances(self.select_param(service), true)
            .await
            .map_err(|err| RegistryError::Select {
                service: service.to_owned(),
                source: Box::new(err),
                context: Some(format!("group `{}`", self.group).into()),
            })?;
        Ok(found.into_iter().map(|instance| instance.into_instance(service)).collect())
    }

    async fn close(&self) -> Result<(), RegistryError> {
        self.client.shutdown().await.map_err(|err| RegistryError::Close {
            backend: self.backend(),
            source: Box::new(err),
            context: Some(format!("group `{}`", self.group).into()),
        })
    }
}
