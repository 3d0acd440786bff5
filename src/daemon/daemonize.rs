// Daemonization support for Unix systems

use super::pid::{PidFile, PidGuard};
use super::signal::Shutdown;
use crate::config::DaemonConfig;
use crate::error::{DaemonError, Result};

/// Working directory of the daemon; always mounted
pub const DAEMON_WORKING_DIR: &str = "/";

/// State held by the fully detached daemon process.
///
/// Dropping it removes the PID file.
#[derive(Debug)]
pub struct Detached {
    shutdown: Shutdown,
    pid_guard: PidGuard,
}

impl Detached {
    /// Termination requests for the worker to observe
    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    pub fn pid_file(&self) -> &PidFile {
        self.pid_guard.pid_file()
    }
}

/// Turn the calling process into a detached daemon.
///
/// Only the final grandchild returns; both intermediate parents exit with
/// status 0. Must run before any other thread is spawned, since threads do
/// not survive `fork`.
#[cfg(unix)]
pub fn daemonize(config: &DaemonConfig) -> Result<Detached> {
    use nix::sys::stat::{umask, Mode};
    use nix::unistd::{chdir, setsid};

    let pid_file = PidFile::with_path(&config.pid_file);

    if pid_file.exists() {
        return Err(DaemonError::AlreadyRunning(pid_file.path().to_path_buf()));
    }

    // First fork detaches from the invoking shell
    fork_and_exit_parent(1)?;

    chdir(DAEMON_WORKING_DIR).map_err(|e| {
        DaemonError::Other(format!(
            "Failed to change directory to {}: {}",
            DAEMON_WORKING_DIR, e
        ))
    })?;
    umask(Mode::empty());
    setsid().map_err(|e| DaemonError::SessionError(e.to_string()))?;

    // Second fork gives up session leadership so no terminal can be acquired
    fork_and_exit_parent(2)?;

    flush_std_streams();
    redirect_std_streams(config)?;

    let pid_guard = PidGuard::create(pid_file.clone())?;
    let shutdown = Shutdown::install(pid_file, config.shutdown_grace())?;

    tracing::info!(
        pid = std::process::id(),
        pid_file = %pid_guard.pid_file().path().display(),
        "Daemon detached"
    );

    Ok(Detached {
        shutdown,
        pid_guard,
    })
}

#[cfg(not(unix))]
pub fn daemonize(_config: &DaemonConfig) -> Result<Detached> {
    Err(DaemonError::Other(
        "Daemonization is only supported on Unix systems".to_string(),
    ))
}

/// Fork; the parent exits successfully and the child returns
#[cfg(unix)]
fn fork_and_exit_parent(stage: u8) -> Result<()> {
    use nix::unistd::{fork, ForkResult};

    // Anything still buffered would otherwise be written by both processes
    flush_std_streams();

    // SAFETY: called before any threads exist; the child only continues the
    // daemonization sequence.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => {
            tracing::debug!(stage, child = child.as_raw(), "Fork parent exiting");
            std::process::exit(0);
        }
        Ok(ForkResult::Child) => Ok(()),
        Err(source) => Err(DaemonError::ForkFailed { stage, source }),
    }
}

fn flush_std_streams() {
    use std::io::Write;

    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();
}

/// Replace fds 0, 1 and 2 with the configured files
#[cfg(unix)]
fn redirect_std_streams(config: &DaemonConfig) -> Result<()> {
    use nix::libc;
    use nix::unistd::dup2;
    use std::fs::{File, OpenOptions};
    use std::os::unix::io::AsRawFd;
    use std::path::Path;

    fn open(path: &Path, options: &OpenOptions) -> Result<File> {
        options.open(path).map_err(|e| {
            DaemonError::RedirectError(format!("Failed to open {}: {}", path.display(), e))
        })
    }

    let mut append = OpenOptions::new();
    append.create(true).append(true);
    let mut read_only = OpenOptions::new();
    read_only.read(true);

    // Open everything before touching the descriptors so a failure leaves
    // the original streams intact for the error report.
    let stdin = open(&config.stdin, &read_only)?;
    let stdout = open(&config.stdout, &append)?;
    let stderr = open(&config.stderr, &append)?;

    for (file, target, name) in [
        (&stdin, libc::STDIN_FILENO, "stdin"),
        (&stdout, libc::STDOUT_FILENO, "stdout"),
        (&stderr, libc::STDERR_FILENO, "stderr"),
    ] {
        dup2(file.as_raw_fd(), target)
            .map_err(|e| DaemonError::RedirectError(format!("dup2 onto {} failed: {}", name, e)))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    #[cfg(unix)]
    fn test_daemonize_refuses_existing_pid_file() {
        let temp_dir = TempDir::new().unwrap();
        let pid_path = temp_dir.path().join("d.pid");
        std::fs::write(&pid_path, "4242\n").unwrap();

        // Fails before the first fork, so this never forks the test runner
        let result = daemonize(&DaemonConfig::with_pid_file(&pid_path));

        assert!(matches!(result, Err(DaemonError::AlreadyRunning(_))));
        assert_eq!(std::fs::read_to_string(&pid_path).unwrap(), "4242\n");
    }
}
