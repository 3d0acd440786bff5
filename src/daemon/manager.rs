// Daemon lifecycle management

use super::daemonize::daemonize;
use super::pid::{PidFile, ProcessState};
use crate::config::DaemonConfig;
use crate::error::{DaemonError, Result};
use crate::worker::Worker;
use std::path::PathBuf;

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{kill, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Result of a successful stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopOutcome {
    /// PID that was read from the PID file
    pub pid: u32,
    /// Number of termination signals attempted
    pub attempts: u32,
    /// The process was already gone and only the file was cleaned up
    pub stale: bool,
}

/// Daemon status information
#[derive(Debug, Clone)]
pub struct DaemonStatus {
    pub state: ProcessState,
    pub pid_file: PathBuf,
}

impl DaemonStatus {
    pub fn running(&self) -> bool {
        matches!(self.state, ProcessState::Running { .. })
    }
}

/// Daemon manager for controlling daemon lifecycle
pub struct DaemonManager {
    config: DaemonConfig,
    pid_file: PidFile,
}

impl DaemonManager {
    pub fn new(config: DaemonConfig) -> Self {
        let pid_file = PidFile::with_path(&config.pid_file);
        Self { config, pid_file }
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    pub fn pid_file(&self) -> &PidFile {
        &self.pid_file
    }

    /// Daemonize and run `worker` until it returns.
    ///
    /// Returns only inside the daemon process; the invoking process exits
    /// during the first fork. The PID file is removed before this returns.
    pub fn start<W: Worker>(&self, mut worker: W) -> Result<()> {
        let detached = daemonize(&self.config)?;

        tracing::info!("Daemon started with pid {}", std::process::id());
        let result = worker.run(detached.shutdown());

        match &result {
            Ok(()) => tracing::info!("Daemon stopped"),
            Err(e) => tracing::error!("Worker failed: {}", e),
        }

        drop(detached);
        result
    }

    /// Stop the daemon by sending SIGTERM until it is gone.
    ///
    /// Polls every `stop_poll_interval_ms`, at most `stop_max_attempts`
    /// times. A PID that no longer exists counts as stopped and its file is
    /// cleaned up. Any other signaling failure leaves the file in place.
    #[cfg(unix)]
    pub fn stop(&self) -> Result<StopOutcome> {
        // A missing file, even one removed by the daemon just now, is NotRunning
        let pid = self.pid_file.read()?;
        let target = Pid::from_raw(pid as i32);
        let max_attempts = self.config.stop_max_attempts;

        tracing::debug!("Stopping daemon (PID: {})", pid);

        let mut signaled = false;
        for attempt in 1..=max_attempts {
            // Exited but unreaped processes still accept signals
            if super::pid::is_zombie(pid) {
                return self.finish_stop(pid, attempt, !signaled);
            }

            match kill(target, Signal::SIGTERM) {
                Ok(()) => signaled = true,
                Err(Errno::ESRCH) => return self.finish_stop(pid, attempt, !signaled),
                Err(e) => {
                    return Err(DaemonError::SignalError(format!(
                        "Failed to send SIGTERM to PID {}: {}",
                        pid, e
                    )))
                }
            }

            std::thread::sleep(self.config.stop_poll_interval());
        }

        // The daemon may have exited during the last poll interval
        if !super::pid::is_process_alive(pid) {
            return self.finish_stop(pid, max_attempts, !signaled);
        }

        Err(DaemonError::StopTimeout {
            pid,
            attempts: max_attempts,
        })
    }

    #[cfg(not(unix))]
    pub fn stop(&self) -> Result<StopOutcome> {
        Err(DaemonError::Other(
            "Daemon stop is only supported on Unix systems".to_string(),
        ))
    }

    fn finish_stop(&self, pid: u32, attempts: u32, stale: bool) -> Result<StopOutcome> {
        if self.pid_file.exists() {
            tracing::debug!(
                "Removing residual pid file {}",
                self.pid_file.path().display()
            );
            self.pid_file.remove()?;
        }

        if stale {
            tracing::debug!("PID {} was not running; cleaned up stale pid file", pid);
        } else {
            tracing::debug!("Daemon (PID: {}) exited after {} attempt(s)", pid, attempts);
        }

        Ok(StopOutcome {
            pid,
            attempts,
            stale,
        })
    }

    /// Stop the daemon if it runs, wait out the grace period, then start again.
    ///
    /// `on_stopped` is called with the stop result (`None` if nothing was
    /// running) before the grace period begins.
    pub fn restart<W, F>(&self, worker: W, on_stopped: F) -> Result<()>
    where
        W: Worker,
        F: FnOnce(Option<&StopOutcome>),
    {
        match self.stop() {
            Ok(outcome) => on_stopped(Some(&outcome)),
            Err(DaemonError::NotRunning(_)) => {
                tracing::debug!("Daemon not running; restart proceeds as a plain start");
                on_stopped(None);
            }
            Err(e) => return Err(e),
        }

        std::thread::sleep(self.config.restart_grace());
        self.start(worker)
    }

    /// Get daemon status information
    pub fn status(&self) -> Result<DaemonStatus> {
        Ok(DaemonStatus {
            state: self.pid_file.state()?,
            pid_file: self.pid_file.path().to_path_buf(),
        })
    }
}
