use crate::loader::{self, ConfigLoader, FileConfigLoader};
use crate::server::{Server, SharedServer};
use crate::signal::shutdown_signal;
use crate::{EngineError, ShutdownReport};
use parking_lot::{Mutex, RwLock};
use quanx_domain::{Instance, ServerConfig};
use quanx_kernel::config::DEFAULT_CONFIG_PATH;
use quanx_registry::{SharedRegistry, global};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, info, warn};

/// Upper bound of a whole shutdown cycle unless configured otherwise.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle of an [`Engine`].
///
/// `Idle -> Starting -> Running -> ShuttingDown -> Stopped`. A failed startup
/// goes from `Starting` straight to `Stopped`. `Stopped` behaves like `Idle`:
/// the engine may run again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    Idle,
    Starting,
    Running,
    ShuttingDown,
    Stopped,
}

impl EngineState {
    /// A run is in progress.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::ShuttingDown)
    }
}

/// Starts a set of servers, announces the process to a registry, waits for a
/// termination trigger and shuts everything down within a deadline.
///
/// `Engine` is a cheap handle; clones drive the same state machine, so one
/// clone can [`run`](Engine::run) while another observes or stops it.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

struct Inner {
    explicit: Mutex<Option<ServerConfig>>,
    effective: RwLock<Option<ServerConfig>>,
    servers: Mutex<Vec<SharedServer>>,
    registry: Option<SharedRegistry>,
    registered: Mutex<Option<(SharedRegistry, Instance)>>,
    loader: Box<dyn ConfigLoader>,
    shutdown_timeout: Duration,
    state: watch::Sender<EngineState>,
}

static GLOBAL: OnceLock<Engine> = OnceLock::new();

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// The process-wide engine, built on first use.
    ///
    /// It loads `server.*` if present (environment and defaults otherwise) and
    /// registers with the process-wide registry, if one is active.
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(|| Self::builder().loader(FileConfigLoader::optional(DEFAULT_CONFIG_PATH)).build())
    }

    /// Replaces the explicit config covering the loaded one. `None` is a no-op.
    ///
    /// # Errors
    /// [`EngineError::AlreadyRunning`] while a run is in progress.
    pub fn set_config(&self, config: impl Into<Option<ServerConfig>>) -> Result<(), EngineError> {
        self.ensure_idle("set_config")?;
        if let Some(config) = config.into() {
            *self.inner.explicit.lock() = Some(config);
        }
        Ok(())
    }

    /// Appends a server; it starts after the ones added before it.
    ///
    /// # Errors
    /// [`EngineError::AlreadyRunning`] while a run is in progress.
    pub fn add_server(&self, server: impl Server + 'static) -> Result<(), EngineError> {
        self.add_servers([Arc::new(server) as SharedServer])
    }

    /// Appends servers in iteration order.
    ///
    /// # Errors
    /// [`EngineError::AlreadyRunning`] while a run is in progress.
    pub fn add_servers(&self, servers: impl IntoIterator<Item = SharedServer>) -> Result<(), EngineError> {
        self.ensure_idle("add_server")?;
        self.inner.servers.lock().extend(servers);
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> EngineState {
        *self.inner.state.borrow()
    }

    /// Watches state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    #[must_use]
    pub fn server_count(&self) -> usize {
        self.inner.servers.lock().len()
    }

    /// The config of the current or last run; `None` before the first run.
    #[must_use]
    pub fn config(&self) -> Option<ServerConfig> {
        self.inner.effective.read().clone()
    }

    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        self.inner.shutdown_timeout
    }

    /// Runs until Ctrl+C or `SIGTERM`, then shuts down.
    ///
    /// # Errors
    /// See [`Engine::run_until`].
    pub async fn run(&self) -> Result<ShutdownReport, EngineError> {
        self.run_until(async {
            match shutdown_signal().await {
                Ok(signal) => info!(%signal, "Termination signal received"),
                Err(err) => error!(error = %err, "Cannot listen for termination signals, shutting down"),
            }
        })
        .await
    }

    /// Starts every server, registers the instance, waits for `stop` and
    /// shuts down.
    ///
    /// Servers start one after another in registration order; the first
    /// failure aborts the run. Servers started before it are left as they
    /// are, call [`Engine::shutdown`] to stop them.
    ///
    /// # Errors
    /// * [`EngineError::AlreadyRunning`] if a run is in progress; that run is
    ///   not affected.
    /// * [`EngineError::ConfigLoad`] / [`EngineError::ConfigInvalid`] when no
    ///   usable config can be resolved.
    /// * [`EngineError::Startup`] when a server fails to start.
    pub async fn run_until<F>(&self, stop: F) -> Result<ShutdownReport, EngineError>
    where
        F: Future<Output = ()> + Send,
    {
        self.claim()?;

        if let Err(err) = self.start().await {
            error!(error = %err, "Engine startup failed");
            self.transition(EngineState::Stopped);
            return Err(err);
        }

        self.transition(EngineState::Running);
        stop.await;
        Ok(self.shutdown().await)
    }

    /// Deregisters the instance, stops every server in reverse registration
    /// order and closes the registry the engine was built with.
    ///
    /// The whole cycle shares one deadline of [`Engine::shutdown_timeout`];
    /// a server still busy when it passes is abandoned and reported as timed
    /// out. Always ends `Stopped` with no servers held.
    pub async fn shutdown(&self) -> ShutdownReport {
        self.transition(EngineState::ShuttingDown);
        let started = Instant::now();
        let deadline = started + self.inner.shutdown_timeout;
        let mut report = ShutdownReport::default();

        self.deregister(deadline).await;

        let servers = std::mem::take(&mut *self.inner.servers.lock());
        for server in servers.iter().rev() {
            let name = server.name();
            match timeout_at(deadline, server.shutdown(deadline)).await {
                Ok(Ok(())) => {
                    info!(server = name, "Server stopped");
                    report.stopped(name);
                }
                Ok(Err(err)) => {
                    error!(server = name, error = %err, "Server shutdown failed");
                    report.failed(name, err.to_string(), false);
                }
                Err(_) => {
                    error!(server = name, timeout = ?self.inner.shutdown_timeout, "Server shutdown timed out");
                    report.failed(name, "shutdown deadline elapsed", true);
                }
            }
        }

        if let Some(registry) = &self.inner.registry {
            match timeout_at(deadline, registry.close()).await {
                Ok(Ok(())) => debug!(backend = registry.backend(), "Registry closed"),
                Ok(Err(err)) => warn!(error = %err, "Closing registry failed"),
                Err(_) => warn!(backend = registry.backend(), "Closing registry timed out"),
            }
        }

        report.finish(started.elapsed());
        self.transition(EngineState::Stopped);
        info!(
            stopped = report.stopped_servers().len(),
            failed = report.failures().len(),
            elapsed_ms = u64::try_from(report.elapsed().as_millis()).unwrap_or(u64::MAX),
            "shutdown complete"
        );
        report
    }

    fn claim(&self) -> Result<(), EngineError> {
        let mut previous = EngineState::Idle;
        let claimed = self.inner.state.send_if_modified(|state| {
            previous = *state;
            if state.is_active() {
                return false;
            }
            *state = EngineState::Starting;
            true
        });
        if claimed {
            debug!(from = ?previous, state = ?EngineState::Starting, "Engine state changed");
            Ok(())
        } else {
            Err(EngineError::AlreadyRunning { context: Some(format!("state is {previous:?}").into()) })
        }
    }

    fn ensure_idle(&self, operation: &'static str) -> Result<(), EngineError> {
        let state = self.state();
        if state.is_active() {
            return Err(EngineError::AlreadyRunning {
                context: Some(format!("{operation} while {state:?}").into()),
            });
        }
        Ok(())
    }

    fn transition(&self, next: EngineState) {
        let previous = self.inner.state.send_replace(next);
        debug!(from = ?previous, state = ?next, "Engine state changed");
    }

    async fn start(&self) -> Result<(), EngineError> {
        let explicit = self.inner.explicit.lock().clone();
        let config = loader::resolve(self.inner.loader.load(), explicit.as_ref())?;
        *self.inner.effective.write() = Some(config.clone());

        let servers = self.inner.servers.lock().clone();
        info!(
            name = %config.name(),
            host = %config.host(),
            servers = servers.len(),
            "Starting engine"
        );

        for server in &servers {
            let name = server.name();
            debug!(server = name, "Starting server");
            server.start(&config).await.map_err(|source| EngineError::Startup {
                server: name.to_owned(),
                source,
                context: None,
            })?;
            info!(server = name, "Server started");
        }

        self.register(&config).await;
        Ok(())
    }

    async fn register(&self, config: &ServerConfig) {
        let Some(registry) = self.inner.registry.clone().or_else(global::active) else {
            debug!("No registry configured, instance not announced");
            return;
        };
        let Some(instance) = config.instance() else {
            warn!(name = %config.name(), "Config has no HTTP endpoint, instance not announced");
            return;
        };

        match registry.register(&instance).await {
            Ok(()) => {
                info!(backend = registry.backend(), instance = %instance, "Instance registered");
                *self.inner.registered.lock() = Some((registry, instance));
            }
            Err(err) => warn!(backend = registry.backend(), error = %err, "Instance registration failed"),
        }
    }

    async fn deregister(&self, deadline: Instant) {
        let registered = self.inner.registered.lock().take();
        let Some((registry, instance)) = registered else {
            return;
        };
        match timeout_at(deadline, registry.deregister(&instance)).await {
            Ok(Ok(())) => info!(backend = registry.backend(), instance = %instance, "Instance deregistered"),
            Ok(Err(err)) => warn!(backend = registry.backend(), error = %err, "Instance deregistration failed"),
            Err(_) => warn!(backend = registry.backend(), instance = %instance, "Instance deregistration timed out"),
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state())
            .field("servers", &self.server_count())
            .field("registry", &self.inner.registry.as_ref().map(|r| r.backend()))
            .field("shutdown_timeout", &self.inner.shutdown_timeout)
            .finish_non_exhaustive()
    }
}

/// Options of an [`Engine`].
#[must_use = "builders do nothing unless you call .build()"]
pub struct EngineBuilder {
    config: Option<ServerConfig>,
    servers: Vec<SharedServer>,
    registry: Option<SharedRegistry>,
    loader: Option<Box<dyn ConfigLoader>>,
    shutdown_timeout: Duration,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            config: None,
            servers: Vec::new(),
            registry: None,
            loader: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl EngineBuilder {
    /// Explicit config, covering whatever the loader produces.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn server(mut self, server: impl Server + 'static) -> Self {
        self.servers.push(Arc::new(server));
        self
    }

    pub fn servers(mut self, servers: impl IntoIterator<Item = SharedServer>) -> Self {
        self.servers.extend(servers);
        self
    }

    /// Registry to announce the instance to. The engine closes it on
    /// shutdown. Without one the process-wide active registry is used.
    pub fn registry(mut self, registry: SharedRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Base config source. Defaults to [`FileConfigLoader::default`].
    pub fn loader(mut self, loader: impl ConfigLoader + 'static) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    pub const fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn build(self) -> Engine {
        let (state, _) = watch::channel(EngineState::Idle);
        Engine {
            inner: Arc::new(Inner {
                explicit: Mutex::new(self.config),
                effective: RwLock::new(None),
                servers: Mutex::new(self.servers),
                registry: self.registry,
                registered: Mutex::new(None),
                loader: self.loader.unwrap_or_else(|| Box::new(FileConfigLoader::default())),
                shutdown_timeout: self.shutdown_timeout,
                state,
            }),
        }
    }
}

impl fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("servers", &self.servers)
            .field("registry", &self.registry)
            .field("custom_loader", &self.loader.is_some())
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quanx_kernel::config::ConfigError;

    fn engine() -> Engine {
        Engine::builder()
            .loader(|| -> Result<ServerConfig, ConfigError> { Ok(ServerConfig::default().with_host("127.0.0.1")) })
            .build()
    }

    #[test]
    fn starts_idle() {
        let engine = engine();
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(!engine.is_running());
        assert!(engine.config().is_none());
        assert_eq!(engine.shutdown_timeout(), DEFAULT_SHUTDOWN_TIMEOUT);
    }

    #[test]
    fn set_config_none_keeps_the_previous_one() {
        let engine = engine();
        engine.set_config(ServerConfig::empty().with_name("orders")).unwrap();
        engine.set_config(None).unwrap();
        assert_eq!(engine.inner.explicit.lock().as_ref().map(ServerConfig::name), Some("orders"));
    }

    #[test]
    fn claim_is_exclusive() {
        let engine = engine();
        engine.claim().unwrap();
        assert!(matches!(engine.claim(), Err(EngineError::AlreadyRunning { .. })));
        assert!(engine.set_config(ServerConfig::default()).is_err());

        engine.transition(EngineState::Stopped);
        engine.claim().unwrap();
    }

    #[test]
    fn global_is_a_singleton() {
        assert!(std::ptr::eq(Engine::global(), Engine::global()));
    }

    #[tokio::test]
    async fn shutdown_without_run_ends_stopped() {
        let engine = engine();
        let report = engine.shutdown().await;
        assert!(report.is_clean());
        assert_eq!(engine.state(), EngineState::Stopped);
    }
}
