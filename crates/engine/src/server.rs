use async_trait::async_trait;
use quanx_domain::ServerConfig;
use quanx_registry::BoxError;
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;

/// Shared handle to a [`Server`], as the engine stores them.
pub type SharedServer = Arc<dyn Server>;

/// Anything the engine can start and stop: an HTTP listener, an RPC listener.
///
/// The engine calls [`Server::start`] once per run, in registration order, and
/// [`Server::shutdown`] once per shutdown, in reverse order.
#[async_trait]
pub trait Server: Send + Sync + fmt::Debug {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Starts serving with the engine's resolved `config`.
    ///
    /// Must return once the server accepts work, not when it stops: long
    /// running loops belong in spawned tasks.
    async fn start(&self, config: &ServerConfig) -> Result<(), BoxError>;

    /// Stops serving, finishing in-flight work until `deadline` at the latest.
    ///
    /// The engine stops waiting at `deadline` whether or not this returns.
    /// Called even if [`Server::start`] never ran or failed, so it has to
    /// tolerate that.
    async fn shutdown(&self, deadline: Instant) -> Result<(), BoxError>;
}

#[async_trait]
impl<S: Server + ?Sized> Server for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn start(&self, config: &ServerConfig) -> Result<(), BoxError> {
        (**self).start(config).await
    }

    async fn shutdown(&self, deadline: Instant) -> Result<(), BoxError> {
        (**self).shutdown(deadline).await
    }
}
