use std::time::Duration;

/// A server that did not stop cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownFailure {
    pub server: String,
    pub reason: String,
    /// The shutdown deadline passed before the server finished.
    pub timed_out: bool,
}

/// Outcome of one shutdown cycle.
///
/// Shutdown never fails as a whole; every server is attempted and whatever
/// went wrong ends up here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    stopped: Vec<String>,
    failures: Vec<ShutdownFailure>,
    elapsed: Duration,
}

impl ShutdownReport {
    pub(crate) fn stopped(&mut self, server: &str) {
        self.stopped.push(server.to_owned());
    }

    pub(crate) fn failed(&mut self, server: &str, reason: impl Into<String>, timed_out: bool) {
        self.failures.push(ShutdownFailure {
            server: server.to_owned(),
            reason: reason.into(),
            timed_out,
        });
    }

    pub(crate) const fn finish(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }

    /// Servers that stopped cleanly, in shutdown order.
    #[must_use]
    pub fn stopped_servers(&self) -> &[String] {
        &self.stopped
    }

    #[must_use]
    pub fn failures(&self) -> &[ShutdownFailure] {
        &self.failures
    }

    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Every server stopped without error.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
