// Termination signal handling for the daemon process

use super::pid::PidFile;
use crate::error::{DaemonError, Result};
use std::cell::Cell;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::time::Duration;

/// Requests shutdown of the paired [`Shutdown`]
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: SyncSender<()>,
}

impl ShutdownTrigger {
    /// Request shutdown. Repeated requests collapse into one.
    pub fn trigger(&self) {
        match self.tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                tracing::debug!("Shutdown requested after the worker finished");
            }
        }
    }
}

/// Receiving side of the termination request, handed to the worker
#[derive(Debug)]
pub struct Shutdown {
    rx: Receiver<()>,
    requested: Cell<bool>,
}

impl Shutdown {
    /// Create a connected trigger/shutdown pair
    pub fn channel() -> (ShutdownTrigger, Shutdown) {
        let (tx, rx) = mpsc::sync_channel(1);
        (
            ShutdownTrigger { tx },
            Shutdown {
                rx,
                requested: Cell::new(false),
            },
        )
    }

    /// Route SIGTERM (and SIGINT/SIGHUP) into a new [`Shutdown`].
    ///
    /// The worker gets `grace` to return after the first signal. If the
    /// process is still alive by then, the handler removes `pid_file` and
    /// exits the process itself. Can be installed once per process.
    pub fn install(pid_file: PidFile, grace: Duration) -> Result<Shutdown> {
        let (trigger, shutdown) = Self::channel();

        ctrlc::set_handler(move || {
            tracing::info!("Termination signal received");
            trigger.trigger();

            // Returning from main ends this thread before the sleep elapses
            std::thread::sleep(grace);
            tracing::warn!(
                "Worker did not stop within {} ms; exiting",
                grace.as_millis()
            );
            if let Err(e) = pid_file.remove() {
                tracing::error!("{}", e);
            }
            std::process::exit(1);
        })
        .map_err(|e| {
            DaemonError::SignalError(format!("Failed to install termination handler: {}", e))
        })?;

        Ok(shutdown)
    }

    /// Check whether shutdown has been requested without blocking
    pub fn is_requested(&self) -> bool {
        if !self.requested.get() && self.rx.try_recv().is_ok() {
            self.requested.set(true);
        }
        self.requested.get()
    }

    /// Sleep for up to `timeout`, returning early with `true` once shutdown is
    /// requested. Returns `false` if the full timeout elapsed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.requested.get() {
            return true;
        }

        match self.rx.recv_timeout(timeout) {
            Ok(()) => {
                self.requested.set(true);
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                // Nobody can request shutdown any more; keep the pacing
                std::thread::sleep(timeout);
                false
            }
        }
    }
}
