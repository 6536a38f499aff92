use async_trait::async_trait;
use parking_lot::Mutex;
use quanx_registry::nacos::{
    DEFAULT_GROUP, DeregisterInstanceParam, NacosError, NacosInstance, NacosRegistry, NamingClient,
    RegisterInstanceParam, SelectParam,
};
use quanx_registry::{Instance, Registry, RegistryError};
use std::error::Error as _;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
struct FakeNaming {
    registered: Mutex<Vec<RegisterInstanceParam>>,
    deregistered: Mutex<Vec<DeregisterInstanceParam>>,
    hosts: Mutex<Vec<NacosInstance>>,
    selects: Mutex<Vec<(SelectParam, bool)>>,
    unavailable: AtomicBool,
    shut_down: AtomicBool,
}

impl FakeNaming {
    fn outage(&self) -> Result<(), NacosError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(NacosError::Status { status: 503, body: "down".into(), context: None });
        }
        Ok(())
    }
}

fn host(ip: &str, healthy: bool) -> NacosInstance {
    NacosInstance {
        instance_id: format!("{ip}#8080#DEFAULT#orders@@svcA"),
        ip: ip.to_owned(),
        port: 8080,
        weight: 1.0,
        healthy,
        enabled: true,
        service_name: "orders@@svcA".to_owned(),
    }
}

#[async_trait]
impl NamingClient for FakeNaming {
    async fn register_instance(&self, param: RegisterInstanceParam) -> Result<(), NacosError> {
        self.outage()?;
        self.registered.lock().push(param);
        Ok(())
    }

    async fn deregister_instance(&self, param: DeregisterInstanceParam) -> Result<(), NacosError> {
        self.outage()?;
        self.deregistered.lock().push(param);
        Ok(())
    }

    async fn select_one_healthy_instance(&self, param: SelectParam) -> Result<NacosInstance, NacosError> {
        self.outage()?;
        let found = self.hosts.lock().iter().find(|h| h.healthy).cloned();
        self.selects.lock().push((param.clone(), true));
        found.ok_or(NacosError::NoHealthyInstance { service: param.service_name, context: None })
    }

    async fn select_instances(
        &self,
        param: SelectParam,
        healthy_only: bool,
    ) -> Result<Vec<NacosInstance>, NacosError> {
        self.outage()?;
        let found = self.hosts.lock().iter().filter(|h| !healthy_only || h.healthy).cloned().collect();
        self.selects.lock().push((param, healthy_only));
        Ok(found)
    }

    async fn shutdown(&self) -> Result<(), NacosError> {
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn register_sends_an_ephemeral_healthy_registration_in_the_group() {
    let registry = NacosRegistry::new("orders", FakeNaming::default());
    registry.register(&Instance::new("svcA", "10.0.0.5", 8080)).await.unwrap();

    let registered = registry.client().registered.lock().clone();
    assert_eq!(
        registered,
        vec![RegisterInstanceParam {
            service_name: "svcA".into(),
            group_name: "orders".into(),
            ip: "10.0.0.5".into(),
            port: 8080,
            weight: 1.0,
            enabled: true,
            healthy: true,
            ephemeral: true,
        }]
    );
}

#[tokio::test]
async fn deregister_targets_the_same_endpoint() {
    let registry = NacosRegistry::new("orders", FakeNaming::default());
    registry.deregister(&Instance::new("svcA", "10.0.0.5", 8080)).await.unwrap();

    let deregistered = registry.client().deregistered.lock().clone();
    assert_eq!(deregistered.len(), 1);
    assert_eq!(deregistered[0].group_name, "orders");
    assert_eq!(deregistered[0].ip, "10.0.0.5");
    assert_eq!(deregistered[0].port, 8080);
    assert!(deregistered[0].ephemeral);
}

#[tokio::test]
async fn empty_group_falls_back_to_default() {
    let registry = NacosRegistry::new("", FakeNaming::default());
    assert_eq!(registry.group(), DEFAULT_GROUP);
}

#[tokio::test]
async fn select_all_asks_for_healthy_instances_only() {
    let registry = NacosRegistry::new("orders", FakeNaming::default());
    registry.client().hosts.lock().extend([host("10.0.0.5", true), host("10.0.0.6", false)]);

    let all = registry.select_all("svcA").await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "svcA");
    assert_eq!(all[0].host, "10.0.0.5");

    let selects = registry.client().selects.lock().clone();
    assert_eq!(selects[0].0.group_name, "orders");
    assert!(selects[0].1, "select_all must request healthy instances only");
}

#[tokio::test]
async fn select_one_maps_no_healthy_instance() {
    let registry = NacosRegistry::new("orders", FakeNaming::default());
    registry.client().hosts.lock().push(host("10.0.0.6", false));

    let err = registry.select_one("svcA").await.unwrap_err();
    assert!(matches!(err, RegistryError::NoHealthyInstance { ref service, .. } if service == "svcA"));
}

#[tokio::test]
async fn backend_failures_keep_their_cause() {
    let registry = NacosRegistry::new("orders", FakeNaming::default());
    registry.client().unavailable.store(true, Ordering::SeqCst);
    let instance = Instance::new("svcA", "10.0.0.5", 8080);

    let err = registry.register(&instance).await.unwrap_err();
    assert!(matches!(err, RegistryError::Register { .. }));
    assert_eq!(err.service(), Some("svcA"));
    let cause = err.source().expect("register error should carry its cause");
    assert!(cause.to_string().contains("503"));

    assert!(matches!(registry.deregister(&instance).await, Err(RegistryError::Deregister { .. })));
    assert!(matches!(registry.select_one("svcA").await, Err(RegistryError::Select { .. })));
    assert!(matches!(registry.select_all("svcA").await, Err(RegistryError::Select { .. })));
}

#[tokio::test]
async fn close_shuts_the_client_down() {
    let registry = NacosRegistry::new("orders", FakeNaming::default());
    registry.close().await.unwrap();
    assert!(registry.client().shut_down.load(Ordering::SeqCst));
}
