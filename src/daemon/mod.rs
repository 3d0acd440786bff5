// Daemon module - detachment, PID file and process control

pub mod daemonize;
pub mod manager;
pub mod pid;
pub mod signal;

pub use daemonize::{daemonize, Detached};
pub use manager::{DaemonManager, DaemonStatus, StopOutcome};
pub use pid::{PidFile, PidGuard, ProcessState};
pub use signal::{Shutdown, ShutdownTrigger};
