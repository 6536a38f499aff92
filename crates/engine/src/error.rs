use quanx_kernel::config::ConfigError;
use quanx_registry::BoxError;
use std::borrow::Cow;

/// Failures that keep the engine from reaching `Running`.
///
/// Per-server shutdown failures are not errors; they are collected in a
/// [`crate::ShutdownReport`].
#[quanx_derive::quanx_error]
pub enum EngineError {
    /// The config source failed and no explicit config was supplied.
    #[error("Config load error{}: {source}", format_context(.context))]
    ConfigLoad { source: ConfigError, context: Option<Cow<'static, str>> },

    #[error("Invalid server config{}: {message}", format_context(.context))]
    ConfigInvalid { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Engine is already running{}", format_context(.context))]
    AlreadyRunning { context: Option<Cow<'static, str>> },

    /// A server failed to start; the servers after it were not started.
    #[error("Server `{server}` failed to start{}: {source}", format_context(.context))]
    Startup { server: String, source: BoxError, context: Option<Cow<'static, str>> },
}
