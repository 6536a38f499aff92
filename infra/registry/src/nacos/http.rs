use super::{
    DEFAULT_CLUSTER, DEFAULT_GROUP, DeregisterInstanceParam, NacosError, NacosErrorExt, NacosInstance,
    NamingClient, RegisterInstanceParam, SelectParam, balancer,
};
use async_trait::async_trait;
use fxhash::FxHashMap;
use parking_lot::{Mutex, RwLock};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

const INSTANCE_PATH: &str = "/v2/ns/instance";
const INSTANCE_LIST_PATH: &str = "/v2/ns/instance/list";
const BEAT_PATH: &str = "/v2/ns/instance/beat";
const LOGIN_PATH: &str = "/v1/auth/login";

/// Result code of a heartbeat for an instance the server no longer knows.
const RESOURCE_NOT_FOUND: i64 = 20404;
const DEFAULT_TOKEN_TTL_SECS: u64 = 18_000;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(30);

/// Connection settings of a Nacos server.
///
/// Deserializes with defaults for every field, so an empty file (or none at
/// all) yields a client for `127.0.0.1:8848`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NacosConfig {
    /// `host:port`, optionally with an `http://` or `https://` scheme.
    pub server_addr: String,
    pub context_path: String,
    pub namespace: String,
    pub group: String,
    /// Credentials for token auth; both or neither.
    pub username: Option<String>,
    pub password: Option<String>,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
}

impl Default for NacosConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:8848".to_owned(),
            context_path: "/nacos".to_owned(),
            namespace: "public".to_owned(),
            group: DEFAULT_GROUP.to_owned(),
            username: None,
            password: None,
            connect_timeout_ms: 3_000,
            read_timeout_ms: 5_000,
            heartbeat_interval_ms: 5_000,
        }
    }
}

impl NacosConfig {
    #[must_use]
    pub fn with_server_addr(mut self, addr: impl Into<String>) -> Self {
        self.server_addr = addr.into();
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Scheme, address and context path, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        let addr = self.server_addr.trim().trim_end_matches('/');
        let scheme =
            if addr.starts_with("http://") || addr.starts_with("https://") { "" } else { "http://" };
        match self.context_path.trim_matches('/') {
            "" => format!("{scheme}{addr}"),
            path => format!("{scheme}{addr}/{path}"),
        }
    }

    /// # Errors
    /// [`NacosError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<(), NacosError> {
        let invalid = |message: &'static str| -> Result<(), NacosError> {
            Err(NacosError::InvalidConfig { message: message.into(), context: None })
        };
        if self.server_addr.trim().is_empty() {
            return invalid("`server_addr` is empty");
        }
        if self.heartbeat_interval_ms == 0 {
            return invalid("`heartbeat_interval_ms` must be positive");
        }
        if self.username.is_some() != self.password.is_some() {
            return invalid("`username` and `password` must be set together");
        }
        Ok(())
    }

    const fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

/// [`NamingClient`] over the Nacos v2 HTTP open API.
///
/// Cheap to clone; clones share the connection pool, the access token and the
/// heartbeat tasks. Every ephemeral registration gets a heartbeat task that
/// runs until the instance is deregistered or the client shuts down. A
/// heartbeat answered with "not found" re-registers the instance.
#[derive(Debug, Clone)]
pub struct HttpNamingClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    config: NacosConfig,
    base_url: String,
    token: RwLock<Option<Token>>,
    heartbeats: Mutex<FxHashMap<String, JoinHandle<()>>>,
}

#[derive(Debug, Clone)]
struct Token {
    value: String,
    expires_at: Instant,
}

impl HttpNamingClient {
    /// # Errors
    /// [`NacosError::InvalidConfig`] when `config` does not validate,
    /// [`NacosError::Http`] when the HTTP client cannot be built.
    pub fn new(config: NacosConfig) -> Result<Self, NacosError> {
        config.validate()?;
        let http = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .build()
            .context("building HTTP client")?;

        let base_url = config.base_url();
        debug!(base_url = %base_url, namespace = %config.namespace, "Created Nacos naming client");
        Ok(Self {
            inner: Arc::new(Inner {
                http,
                config,
                base_url,
                token: RwLock::new(None),
                heartbeats: Mutex::new(FxHashMap::default()),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &NacosConfig {
        &self.inner.config
    }

    /// Number of registrations currently kept alive by heartbeats.
    #[must_use]
    pub fn heartbeat_count(&self) -> usize {
        self.inner.heartbeats.lock().len()
    }

    fn start_heartbeat(&self, param: RegisterInstanceParam) {
        let key = heartbeat_key(&param.group_name, &param.service_name, &param.ip, param.port);
        let task = tokio::spawn(heartbeat_loop(Arc::downgrade(&self.inner), param));
        if let Some(previous) = self.inner.heartbeats.lock().insert(key, task) {
            previous.abort();
        }
    }

    fn stop_heartbeat(&self, group: &str, service: &str, ip: &str, port: u16) {
        let key = heartbeat_key(group, service, ip, port);
        if let Some(task) = self.inner.heartbeats.lock().remove(&key) {
            task.abort();
        }
    }
}

#[async_trait]
impl NamingClient for HttpNamingClient {
    async fn register_instance(&self, param: RegisterInstanceParam) -> Result<(), NacosError> {
        self.inner.register(&param).await?;
        if param.ephemeral {
            self.start_heartbeat(param);
        }
        Ok(())
    }

    async fn deregister_instance(&self, param: DeregisterInstanceParam) -> Result<(), NacosError> {
        self.stop_heartbeat(&param.group_name, &param.service_name, &param.ip, param.port);
        let form = InstanceForm {
            namespace_id: &self.inner.config.namespace,
            service_name: &param.service_name,
            group_name: &param.group_name,
            cluster_name: DEFAULT_CLUSTER,
            ip: &param.ip,
            port: param.port,
            ephemeral: param.ephemeral,
            weight: None,
            enabled: None,
            healthy: None,
        };
        let request = self.inner.http.delete(self.inner.url(INSTANCE_PATH)).form(&form);
        self.inner
            .call::<serde_json::Value>(request)
            .await
            .context(format!("deregistering {}:{} from `{}`", param.ip, param.port, param.service_name))?;
        Ok(())
    }

    async fn select_one_healthy_instance(&self, param: SelectParam) -> Result<NacosInstance, NacosError> {
        let instances = self.select_instances(param.clone(), true).await?;
        balancer::pick(&instances).cloned().ok_or_else(|| NacosError::NoHealthyInstance {
            service: param.service_name,
            context: Some(format!("group `{}`", param.group_name).into()),
        })
    }

    async fn select_instances(
        &self,
        param: SelectParam,
        healthy_only: bool,
    ) -> Result<Vec<NacosInstance>, NacosError> {
        let query = ListQuery {
            namespace_id: &self.inner.config.namespace,
            service_name: &param.service_name,
            group_name: &param.group_name,
            healthy_only,
        };
        let request = self.inner.http.get(self.inner.url(INSTANCE_LIST_PATH)).query(&query);
        let service = self
            .inner
            .call::<ServiceInfo>(request)
            .await
            .context(format!("listing instances of `{}`", param.service_name))?
            .unwrap_or_default();

        Ok(service
            .hosts
            .into_iter()
            .filter(|host| !healthy_only || (host.healthy && host.enabled))
            .collect())
    }

    async fn shutdown(&self) -> Result<(), NacosError> {
        let tasks: Vec<_> = self.inner.heartbeats.lock().drain().map(|(_, task)| task).collect();
        for task in &tasks {
            task.abort();
        }
        *self.inner.token.write() = None;
        info!(stopped_heartbeats = tasks.len(), "Nacos naming client shut down");
        Ok(())
    }
}

impl Inner {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn register(&self, param: &RegisterInstanceParam) -> Result<(), NacosError> {
        let form = InstanceForm {
            namespace_id: &self.config.namespace,
            service_name: &param.service_name,
            group_name: &param.group_name,
            cluster_name: DEFAULT_CLUSTER,
            ip: &param.ip,
            port: param.port,
            ephemeral: param.ephemeral,
            weight: Some(param.weight),
            enabled: Some(param.enabled),
            healthy: Some(param.healthy),
        };
        let request = self.http.post(self.url(INSTANCE_PATH)).form(&form);
        self.call::<serde_json::Value>(request)
            .await
            .context(format!("registering {}:{} as `{}`", param.ip, param.port, param.service_name))?;
        Ok(())
    }

    async fn beat(&self, param: &RegisterInstanceParam) -> Result<BeatResult, NacosError> {
        let beat = BeatInfo {
            service_name: format!("{}@@{}", param.group_name, param.service_name),
            ip: &param.ip,
            port: param.port,
            cluster: DEFAULT_CLUSTER,
            weight: param.weight,
            ephemeral: param.ephemeral,
        };
        let beat = serde_json::to_string(&beat).map_err(|err| NacosError::InvalidConfig {
            message: err.to_string().into(),
            context: Some("encoding heartbeat".into()),
        })?;
        let form = BeatForm {
            namespace_id: &self.config.namespace,
            service_name: &param.service_name,
            group_name: &param.group_name,
            beat,
        };
        let request = self.http.put(self.url(BEAT_PATH)).form(&form);
        Ok(self.call::<BeatResult>(request).await?.unwrap_or_default())
    }

    /// Sends `request` with the access token attached and unwraps the
    /// `{ code, message, data }` envelope.
    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Option<T>, NacosError> {
        let request = match self.access_token().await? {
            Some(token) => request.query(&[("accessToken", token)]),
            None => request,
        };
        let response = checked(request.send().await?).await?;
        let envelope: ApiResult<T> = response.json().await.context("decoding response")?;
        if envelope.code != 0 {
            return Err(NacosError::Api { code: envelope.code, message: envelope.message, context: None });
        }
        Ok(envelope.data)
    }

    async fn access_token(&self) -> Result<Option<String>, NacosError> {
        let (Some(username), Some(password)) = (&self.config.username, &self.config.password) else {
            return Ok(None);
        };
        if let Some(token) = self.cached_token() {
            return Ok(Some(token));
        }

        let response = self
            .http
            .post(self.url(LOGIN_PATH))
            .form(&[("username", username.as_str()), ("password", password.as_str())])
            .send()
            .await
            .context("logging in")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NacosError::Auth { message: format!("HTTP {status}: {body}").into(), context: None });
        }

        let login: LoginResult = response.json().await.context("decoding login response")?;
        let value = login.access_token.filter(|token| !token.is_empty()).ok_or(NacosError::Auth {
            message: Cow::Borrowed("login response carried no access token"),
            context: None,
        })?;
        let ttl = Duration::from_secs(login.token_ttl.unwrap_or(DEFAULT_TOKEN_TTL_SECS));
        *self.token.write() = Some(Token { value: value.clone(), expires_at: Instant::now() + ttl });
        debug!(ttl_secs = ttl.as_secs(), "Obtained Nacos access token");
        Ok(Some(value))
    }

    fn cached_token(&self) -> Option<String> {
        self.token
            .read()
            .as_ref()
            .filter(|token| token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN)
            .map(|token| token.value.clone())
    }
}

async fn heartbeat_loop(inner: Weak<Inner>, param: RegisterInstanceParam) {
    let Some(period) = inner.upgrade().map(|inner| inner.config.heartbeat_interval()) else {
        return;
    };
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            return;
        };

        let lost = match inner.beat(&param).await {
            Ok(beat) => beat.code == RESOURCE_NOT_FOUND,
            Err(NacosError::Api { code: RESOURCE_NOT_FOUND, .. }) => true,
            Err(err) => {
                warn!(service = %param.service_name, error = %err, "Nacos heartbeat failed");
                false
            }
        };
        if lost {
            warn!(service = %param.service_name, ip = %param.ip, port = param.port, "Instance unknown to Nacos, re-registering");
            if let Err(err) = inner.register(&param).await {
                warn!(service = %param.service_name, error = %err, "Nacos re-registration failed");
            }
        }
    }
}

async fn checked(response: Response) -> Result<Response, NacosError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(NacosError::Status { status: status.as_u16(), body, context: None })
}

fn heartbeat_key(group: &str, service: &str, ip: &str, port: u16) -> String {
    format!("{group}@@{service}#{ip}#{port}")
}

#[derive(Debug, Deserialize)]
struct ApiResult<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceInfo {
    #[serde(default)]
    hosts: Vec<NacosInstance>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BeatResult {
    #[serde(default)]
    code: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResult {
    access_token: Option<String>,
    token_ttl: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InstanceForm<'a> {
    namespace_id: &'a str,
    service_name: &'a str,
    group_name: &'a str,
    cluster_name: &'a str,
    ip: &'a str,
    port: u16,
    ephemeral: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    healthy: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery<'a> {
    namespace_id: &'a str,
    service_name: &'a str,
    group_name: &'a str,
    healthy_only: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BeatForm<'a> {
    namespace_id: &'a str,
    service_name: &'a str,
    group_name: &'a str,
    beat: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BeatInfo<'a> {
    service_name: String,
    ip: &'a str,
    port: u16,
    cluster: &'a str,
    weight: f64,
    ephemeral: bool,
}
