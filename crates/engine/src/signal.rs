use std::fmt;
use std::io;
use tokio::signal;

/// Termination signals the engine reacts to.
///
/// `SIGKILL` cannot be caught, so it is not listened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// `SIGINT` / Ctrl+C.
    Interrupt,
    /// `SIGTERM`, as sent by process managers.
    Terminate,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
        })
    }
}

/// Waits for the first of Ctrl+C or `SIGTERM`.
///
/// # Errors
/// Fails when a signal handler cannot be installed.
pub async fn shutdown_signal() -> io::Result<Signal> {
    let ctrl_c = async {
        signal::ctrl_c().await?;
        Ok::<_, io::Error>(Signal::Interrupt)
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())?.recv().await;
        Ok::<_, io::Error>(Signal::Terminate)
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<io::Result<Signal>>();

    tokio::select! {
        res = ctrl_c => res,
        res = terminate => res,
    }
}
