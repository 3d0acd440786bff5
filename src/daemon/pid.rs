// PID file management for the daemon process

use crate::error::{DaemonError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// What the PID file says about the daemon, computed on demand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// No PID file
    Stopped,
    /// PID file names a live process
    Running { pid: u32 },
    /// PID file names a process that no longer exists
    Stale { pid: u32 },
}

/// Manages the daemon PID file
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Create a PID file manager for the given path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Write the current process PID to the file as a single line
    pub fn write(&self) -> Result<()> {
        let pid = std::process::id();
        fs::write(&self.path, format!("{}\n", pid)).map_err(|e| {
            DaemonError::PidFileError(format!(
                "Failed to write PID file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(())
    }

    /// Read the PID from the file. A missing file means the daemon is not
    /// running.
    pub fn read(&self) -> Result<u32> {
        let content = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => DaemonError::NotRunning(self.path.clone()),
            _ => DaemonError::PidFileError(format!(
                "Failed to read PID file {}: {}",
                self.path.display(),
                e
            )),
        })?;

        parse_pid(&content)
    }

    /// Check if the PID file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Remove the PID file; a file that is already gone is not an error
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DaemonError::PidFileError(format!(
                "Failed to remove PID file {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Determine the daemon state from the file and the process table
    pub fn state(&self) -> Result<ProcessState> {
        let pid = match self.read() {
            Ok(pid) => pid,
            Err(DaemonError::NotRunning(_)) => return Ok(ProcessState::Stopped),
            Err(e) => return Err(e),
        };

        if is_process_alive(pid) {
            Ok(ProcessState::Running { pid })
        } else {
            Ok(ProcessState::Stale { pid })
        }
    }

    /// Get the path to the PID file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse PID file contents. Zero and values outside the positive `pid_t`
/// range are rejected since they address process groups when signaled.
pub fn parse_pid(content: &str) -> Result<u32> {
    let trimmed = content.trim();
    let pid = trimmed
        .parse::<u32>()
        .map_err(|e| DaemonError::InvalidPid(format!("'{}': {}", trimmed, e)))?;

    if pid == 0 || pid > i32::MAX as u32 {
        return Err(DaemonError::InvalidPid(format!(
            "'{}' is not a valid process ID",
            trimmed
        )));
    }

    Ok(pid)
}

/// Check if a process with the given PID is alive
#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if pid == 0 || pid > i32::MAX as u32 {
        return false;
    }

    // Signal 0 only performs the existence and permission checks
    match kill(Pid::from_raw(pid as i32), None::<Signal>) {
        Ok(()) => !is_zombie(pid),
        Err(Errno::ESRCH) => false,
        Err(Errno::EPERM) => true, // exists, owned by someone else
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn is_process_alive(_pid: u32) -> bool {
    false
}

/// An exited process that its parent has not reaped yet still accepts signals
pub fn is_zombie(pid: u32) -> bool {
    use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};

    let sys_pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[sys_pid]),
        true,
        ProcessRefreshKind::new(),
    );

    matches!(
        system.process(sys_pid).map(|p| p.status()),
        Some(ProcessStatus::Zombie)
    )
}

/// Removes the PID file when dropped.
///
/// Held by the daemon for as long as it runs, so the file disappears on every
/// orderly exit path: worker return, worker error, termination signal or
/// unwinding panic.
#[derive(Debug)]
pub struct PidGuard {
    pid_file: PidFile,
}

impl PidGuard {
    /// Write the current PID and return a guard owning the file
    pub fn create(pid_file: PidFile) -> Result<Self> {
        pid_file.write()?;
        Ok(Self { pid_file })
    }

    pub fn pid_file(&self) -> &PidFile {
        &self.pid_file
    }
}

impl Drop for PidGuard {
    fn drop(&mut self) {
        match self.pid_file.remove() {
            Ok(()) => tracing::debug!("Removed pid file {}", self.pid_file.path().display()),
            Err(e) => tracing::error!("{}", e),
        }
    }
}
