use std::path::PathBuf;
use thiserror::Error;

/// Main error type for daemon control operations
#[derive(Debug, Error)]
pub enum DaemonError {
    // Lifecycle errors
    #[error("Daemon already running (pid file {} exists)", .0.display())]
    AlreadyRunning(PathBuf),

    #[error("Daemon not running (no pid file at {})", .0.display())]
    NotRunning(PathBuf),

    #[cfg(unix)]
    #[error("Fork #{stage} failed: {source}")]
    ForkFailed {
        stage: u8,
        #[source]
        source: nix::errno::Errno,
    },

    #[error("Failed to create new session: {0}")]
    SessionError(String),

    #[error("Failed to redirect standard streams: {0}")]
    RedirectError(String),

    #[error("Daemon did not exit after {attempts} termination attempts (PID: {pid})")]
    StopTimeout { pid: u32, attempts: u32 },

    // PID file errors
    #[error("PID file error: {0}")]
    PidFileError(String),

    #[error("Invalid PID: {0}")]
    InvalidPid(String),

    // Signal errors
    #[error("Signal error: {0}")]
    SignalError(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration file: {0}")]
    InvalidConfig(String),

    #[error("Missing required configuration field: {0}")]
    MissingConfigField(String),

    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // Workload errors
    #[error("Worker error: {0}")]
    WorkerError(String),

    // IO errors (automatically converted from std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for daemon operations
pub type Result<T> = std::result::Result<T, DaemonError>;
