use crate::{Registry, RegistryError};
use async_trait::async_trait;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use quanx_domain::Instance;
use rand::seq::IndexedRandom;
use tracing::debug;

/// Registry kept in process memory.
///
/// Every registered instance counts as healthy and changes are visible to the
/// next lookup immediately. Re-registering the same endpoint replaces the entry.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    services: RwLock<FxHashMap<String, Vec<Instance>>>,
}

impl InMemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instances across all services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.read().values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Registry for InMemoryRegistry {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn register(&self, instance: &Instance) -> Result<(), RegistryError> {
        let mut services = self.services.write();
        let instances = services.entry(instance.name.clone()).or_default();
        instances.retain(|known| !known.same_endpoint(instance));
        instances.push(instance.clone());
        debug!(service = %instance.name, instance = %instance, "Registered in memory");
        Ok(())
    }

    async fn deregister(&self, instance: &Instance) -> Result<(), RegistryError> {
        let mut services = self.services.write();
        if let Some(instances) = services.get_mut(&instance.name) {
            instances.retain(|known| !known.same_endpoint(instance));
            if instances.is_empty() {
                services.remove(&instance.name);
            }
        }
        debug!(service = %instance.name, instance = %instance, "Deregistered from memory");
        Ok(())
    }

    async fn select_one(&self, service: &str) -> Result<Instance, RegistryError> {
        let services = self.services.read();
        services
            .get(service)
            .and_then(|instances| instances.choose(&mut rand::rng()))
            .cloned()
            .ok_or_else(|| RegistryError::NoHealthyInstance {
                service: service.to_owned(),
                context: None,
            })
    }

    async fn select_all(&self, service: &str) -> Result<Vec<Instance>, RegistryError> {
        Ok(self.services.read().get(service).cloned().unwrap_or_default())
    }

    async fn close(&self) -> Result<(), RegistryError> {
        self.services.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reregistering_replaces_the_entry() {
        let registry = InMemoryRegistry::new();
        let first = Instance::new("svcA", "10.0.0.5", 8080);
        registry.register(&first).await.unwrap();
        registry.register(&first.clone().with_id("i1")).await.unwrap();

        let all = registry.select_all("svcA").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "i1");
    }

    #[tokio::test]
    async fn close_forgets_everything() {
        let registry = InMemoryRegistry::new();
        registry.register(&Instance::new("svcA", "10.0.0.5", 8080)).await.unwrap();
        assert!(!registry.is_empty());

        registry.close().await.unwrap();
        assert!(registry.is_empty());
    }
}
