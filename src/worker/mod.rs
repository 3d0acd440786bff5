// Workload run inside the daemon

use crate::daemon::Shutdown;
use crate::error::{DaemonError, Result};
use chrono::Local;
use std::io::{self, Write};
use std::time::Duration;

/// A long-running routine executed by the daemon.
///
/// Implementations must return promptly once `shutdown` reports a request;
/// blocking waits should go through [`Shutdown::wait_timeout`] so the
/// termination signal can interrupt them.
pub trait Worker {
    fn run(&mut self, shutdown: &Shutdown) -> Result<()>;
}

impl<F> Worker for F
where
    F: FnMut(&Shutdown) -> Result<()>,
{
    fn run(&mut self, shutdown: &Shutdown) -> Result<()> {
        self(shutdown)
    }
}

/// Reference workload: writes a liveness line every interval
pub struct HeartbeatWorker<W: Write = io::Stdout> {
    interval: Duration,
    out: W,
}

impl HeartbeatWorker<io::Stdout> {
    /// Heartbeat on standard output (the redirected stream inside the daemon)
    pub fn stdout(interval: Duration) -> Self {
        Self::with_writer(interval, io::stdout())
    }
}

impl<W: Write> HeartbeatWorker<W> {
    pub fn with_writer(interval: Duration, out: W) -> Self {
        Self { interval, out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, message: &str) -> Result<()> {
        writeln!(self.out, "{}", message)
            .and_then(|_| self.out.flush())
            .map_err(|e| DaemonError::WorkerError(format!("Failed to write heartbeat: {}", e)))
    }
}

impl<W: Write> Worker for HeartbeatWorker<W> {
    fn run(&mut self, shutdown: &Shutdown) -> Result<()> {
        self.line(&format!("Daemon started with pid {}", std::process::id()))?;

        loop {
            self.line(&format!("Daemon alive! {}", Local::now().format("%a %b %e %T %Y")))?;

            if shutdown.wait_timeout(self.interval) {
                break;
            }
        }

        tracing::info!("Heartbeat worker stopping");
        self.line("Daemon stopping")
    }
}
