//! # Quanx Server
//!
//! An HTTP [`Server`] for the quanx engine, built on `axum` and `axum-server`.
//!
//! Routes:
//! * `GET /health`: name, host and ports of the running service.
//! * `GET /discovery/{service}`: healthy instances of `service` from the registry.
//!
//! ## Example
//! ```no_run
//! use quanx_engine::Engine;
//! use quanx_server::HttpServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let report = Engine::builder().server(HttpServer::new()).build().run().await?;
//!     anyhow::ensure!(report.is_clean(), "unclean shutdown");
//!     Ok(())
//! }
//! ```

mod router;

use async_trait::async_trait;
use axum_server::Handle;
use parking_lot::Mutex;
use quanx_domain::ServerConfig;
use quanx_domain::config::HTTP;
use quanx_engine::{BoxError, Server};
use quanx_registry::nacos::NacosConfig;
use quanx_registry::{SharedRegistry, global};
use serde::Deserialize;
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tracing::{error, info, warn};

/// Application settings beyond [`ServerConfig`], read from the same source.
///
/// ```toml
/// [nacos]
/// server_addr = "10.0.0.2:8848"
/// group = "orders"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Registers with Nacos when present.
    pub nacos: Option<NacosConfig>,
}

/// HTTP listener bound to `host:port["http"]` of the engine's config.
///
/// A host that is not an IP address binds every interface. Port `0` picks a
/// free port; see [`HttpServer::local_addr`].
#[derive(Debug)]
pub struct HttpServer {
    name: String,
    registry: Option<SharedRegistry>,
    running: Mutex<Option<Running>>,
}

struct Running {
    handle: Handle<SocketAddr>,
    task: JoinHandle<io::Result<()>>,
    addr: SocketAddr,
}

impl fmt::Debug for Running {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Running").field("addr", &self.addr).finish_non_exhaustive()
    }
}

impl Default for HttpServer {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpServer {
    #[must_use]
    pub fn new() -> Self {
        Self { name: HTTP.to_owned(), registry: None, running: Mutex::new(None) }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registry queried by `/discovery`. Defaults to the process-wide one.
    #[must_use]
    pub fn with_registry(mut self, registry: SharedRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// The address actually bound, while running.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().as_ref().map(|running| running.addr)
    }

    fn bind_addr(config: &ServerConfig) -> Result<SocketAddr, BoxError> {
        let port = config
            .port
            .get(HTTP)
            .copied()
            .ok_or_else(|| format!("no `{HTTP}` port in the config of `{}`", config.name()))?;
        let ip = config.host().parse::<IpAddr>().unwrap_or_else(|_| {
            warn!(host = %config.host(), "Host is not an IP address, binding all interfaces");
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        });
        Ok(SocketAddr::new(ip, port))
    }
}

#[async_trait]
impl Server for HttpServer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, config: &ServerConfig) -> Result<(), BoxError> {
        let address = Self::bind_addr(config)?;
        let state = Arc::new(router::AppState {
            config: config.clone(),
            registry: self.registry.clone().or_else(global::active),
        });
        let app = router::init(state);

        let handle = Handle::<SocketAddr>::new();
        let mut task = tokio::spawn(
            axum_server::bind(address).handle(handle.clone()).serve(app.into_make_service()),
        );

        let Some(addr) = handle.listening().await else {
            return Err(match (&mut task).await {
                Ok(Err(err)) => format!("binding {address} failed: {err}").into(),
                Ok(Ok(())) => format!("listener on {address} exited before accepting").into(),
                Err(err) => format!("listener task on {address} failed: {err}").into(),
            });
        };

        info!(server = %self.name, address = %addr, "HTTP server listening on http://{addr}");
        *self.running.lock() = Some(Running { handle, task, addr });
        Ok(())
    }

    async fn shutdown(&self, deadline: Instant) -> Result<(), BoxError> {
        let running = self.running.lock().take();
        let Some(Running { handle, task, addr }) = running else {
            return Ok(());
        };

        handle.graceful_shutdown(Some(deadline.saturating_duration_since(Instant::now())));
        match timeout_at(deadline, task).await {
            Ok(Ok(Ok(()))) => {
                info!(server = %self.name, address = %addr, "HTTP server stopped");
                Ok(())
            }
            Ok(Ok(Err(err))) => Err(format!("HTTP server on {addr} failed: {err}").into()),
            Ok(Err(err)) => Err(format!("HTTP server task on {addr} failed: {err}").into()),
            Err(_) => {
                error!(server = %self.name, address = %addr, "Forcing HTTP server down");
                handle.shutdown();
                Err(format!("HTTP server on {addr} did not drain in time").into())
            }
        }
    }
}
