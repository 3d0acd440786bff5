use crate::error::{DaemonError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default PID file location
pub const DEFAULT_PID_FILE: &str = "/tmp/daemonctl.pid";

/// Discard sink used for every standard stream unless overridden
pub const DEV_NULL: &str = "/dev/null";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Daemon configuration: redirection targets, PID file and controller timings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// PID file marking the running daemon
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    /// Source for the daemon's standard input (opened read-only)
    #[serde(default = "default_stream")]
    pub stdin: PathBuf,

    /// Destination for the daemon's standard output (opened for append)
    #[serde(default = "default_stream")]
    pub stdout: PathBuf,

    /// Destination for the daemon's standard error (opened for append)
    #[serde(default = "default_stream")]
    pub stderr: PathBuf,

    /// Delay between termination signals while stopping (in milliseconds)
    #[serde(default = "default_stop_poll_interval")]
    pub stop_poll_interval_ms: u64,

    /// Maximum number of termination signals sent before giving up
    #[serde(default = "default_stop_max_attempts")]
    pub stop_max_attempts: u32,

    /// Time the worker gets to return after a termination signal before the
    /// daemon exits on its own (in milliseconds)
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_ms: u64,

    /// Pause between stop and start during restart (in milliseconds)
    #[serde(default = "default_restart_grace")]
    pub restart_grace_ms: u64,

    /// Interval between heartbeat lines (in seconds)
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Log filter used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions for serde
fn default_pid_file() -> PathBuf {
    PathBuf::from(DEFAULT_PID_FILE)
}

fn default_stream() -> PathBuf {
    PathBuf::from(DEV_NULL)
}

fn default_stop_poll_interval() -> u64 {
    100
}

fn default_stop_max_attempts() -> u32 {
    100
}

fn default_shutdown_grace() -> u64 {
    5000
}

fn default_restart_grace() -> u64 {
    2000
}

fn default_heartbeat_interval() -> u64 {
    12
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            pid_file: default_pid_file(),
            stdin: default_stream(),
            stdout: default_stream(),
            stderr: default_stream(),
            stop_poll_interval_ms: default_stop_poll_interval(),
            stop_max_attempts: default_stop_max_attempts(),
            shutdown_grace_ms: default_shutdown_grace(),
            restart_grace_ms: default_restart_grace(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            log_level: default_log_level(),
        }
    }
}

impl DaemonConfig {
    /// Create a configuration with the given PID file and default streams
    pub fn with_pid_file<P: AsRef<Path>>(pid_file: P) -> Self {
        Self {
            pid_file: pid_file.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Load a configuration from a file (supports TOML and JSON).
    ///
    /// The result is not validated, so callers can apply overrides first and
    /// then call [`DaemonConfig::validate`].
    pub fn from_file(path: &Path) -> Result<DaemonConfig> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DaemonError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        let mut config = match extension {
            "toml" => Self::parse_toml(&contents)?,
            "json" => Self::parse_json(&contents)?,
            _ => {
                return Err(DaemonError::InvalidConfig(format!(
                    "Unsupported file format: {}. Use .toml or .json",
                    extension
                )))
            }
        };

        config.expand_env_vars();

        Ok(config)
    }

    fn parse_toml(contents: &str) -> Result<DaemonConfig> {
        toml::from_str(contents)
            .map_err(|e| DaemonError::InvalidConfig(format!("Failed to parse TOML: {}", e)))
    }

    fn parse_json(contents: &str) -> Result<DaemonConfig> {
        serde_json::from_str(contents)
            .map_err(|e| DaemonError::InvalidConfig(format!("Failed to parse JSON: {}", e)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for (field, path) in self.paths() {
            if path.as_os_str().is_empty() {
                return Err(DaemonError::MissingConfigField(field.to_string()));
            }
        }

        if self.pid_file.file_name().is_none() {
            return Err(DaemonError::ConfigValidationError(format!(
                "pid_file must name a file: {}",
                self.pid_file.display()
            )));
        }

        for (field, path) in self.stream_paths() {
            if path == &self.pid_file {
                return Err(DaemonError::ConfigValidationError(format!(
                    "pid_file must not be the same path as {}: {}",
                    field,
                    path.display()
                )));
            }
        }

        if self.stop_poll_interval_ms == 0 {
            return Err(DaemonError::ConfigValidationError(
                "stop_poll_interval_ms must be at least 1".to_string(),
            ));
        }

        if self.stop_max_attempts == 0 {
            return Err(DaemonError::ConfigValidationError(
                "stop_max_attempts must be at least 1".to_string(),
            ));
        }

        if self.heartbeat_interval_secs == 0 {
            return Err(DaemonError::ConfigValidationError(
                "heartbeat_interval_secs must be at least 1".to_string(),
            ));
        }

        // The daemon must be able to exit on its own before stop gives up
        let stop_window_ms = self
            .stop_poll_interval_ms
            .saturating_mul(u64::from(self.stop_max_attempts));
        if self.shutdown_grace_ms >= stop_window_ms {
            return Err(DaemonError::ConfigValidationError(format!(
                "shutdown_grace_ms ({}) must be shorter than the stop window of {} ms \
                 (stop_poll_interval_ms x stop_max_attempts)",
                self.shutdown_grace_ms, stop_window_ms
            )));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(DaemonError::ConfigValidationError(format!(
                "Invalid log_level: {}. Must be one of: {}",
                self.log_level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    /// Resolve relative paths against `base`.
    ///
    /// The daemon changes its working directory to `/` before opening its
    /// streams, so every path must be absolute by the time it daemonizes.
    pub fn absolutize(&mut self, base: &Path) {
        for path in [
            &mut self.pid_file,
            &mut self.stdin,
            &mut self.stdout,
            &mut self.stderr,
        ] {
            if path.is_relative() && !path.as_os_str().is_empty() {
                *path = base.join(&*path);
            }
        }
    }

    /// Expand environment variables in all configured paths
    fn expand_env_vars(&mut self) {
        self.pid_file = expand_env_in_path(&self.pid_file);
        self.stdin = expand_env_in_path(&self.stdin);
        self.stdout = expand_env_in_path(&self.stdout);
        self.stderr = expand_env_in_path(&self.stderr);
    }

    fn paths(&self) -> [(&'static str, &PathBuf); 4] {
        [
            ("pid_file", &self.pid_file),
            ("stdin", &self.stdin),
            ("stdout", &self.stdout),
            ("stderr", &self.stderr),
        ]
    }

    fn stream_paths(&self) -> [(&'static str, &PathBuf); 3] {
        [
            ("stdin", &self.stdin),
            ("stdout", &self.stdout),
            ("stderr", &self.stderr),
        ]
    }

    /// Get the stop poll interval as Duration
    pub fn stop_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stop_poll_interval_ms)
    }

    /// Get the shutdown grace period as Duration
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Get the restart grace period as Duration
    pub fn restart_grace(&self) -> Duration {
        Duration::from_millis(self.restart_grace_ms)
    }

    /// Get the heartbeat interval as Duration
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

/// Expand `$VAR` and `${VAR}` references; unknown variables are left as written
fn expand_env_in_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(start) = rest.find('$') {
        result.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        match std::env::var(name) {
            Ok(value) if !name.is_empty() => result.push_str(&value),
            _ => result.push_str(&rest[start..start + 1 + consumed]),
        }
        rest = &after[consumed..];
    }

    result.push_str(rest);
    result
}

fn expand_env_in_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(expand_env_in_string(&path_str))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_daemon_config_defaults() {
        let config = DaemonConfig::default();

        assert_eq!(config.pid_file, PathBuf::from(DEFAULT_PID_FILE));
        assert_eq!(config.stdin, PathBuf::from("/dev/null"));
        assert_eq!(config.stdout, PathBuf::from("/dev/null"));
        assert_eq!(config.stderr, PathBuf::from("/dev/null"));
        assert_eq!(config.stop_poll_interval(), Duration::from_millis(100));
        assert_eq!(config.stop_max_attempts, 100);
        assert_eq!(config.shutdown_grace(), Duration::from_secs(5));
        assert_eq!(config.restart_grace(), Duration::from_secs(2));
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(12));
        assert_eq!(config.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_pid_file() {
        let config = DaemonConfig::with_pid_file("");

        assert!(matches!(
            config.validate(),
            Err(DaemonError::MissingConfigField(_))
        ));
    }

    #[test]
    fn test_validate_pid_file_shared_with_stream() {
        let mut config = DaemonConfig::with_pid_file("/tmp/shared.log");
        config.stdout = PathBuf::from("/tmp/shared.log");

        assert!(matches!(
            config.validate(),
            Err(DaemonError::ConfigValidationError(_))
        ));
    }

    #[test]
    fn test_validate_zero_attempts() {
        let mut config = DaemonConfig::default();
        config.stop_max_attempts = 0;

        assert!(matches!(
            config.validate(),
            Err(DaemonError::ConfigValidationError(_))
        ));
    }

    #[test]
    fn test_validate_shutdown_grace_exceeds_stop_window() {
        let mut config = DaemonConfig::default();
        config.stop_poll_interval_ms = 100;
        config.stop_max_attempts = 10;
        config.shutdown_grace_ms = 1000;

        assert!(matches!(
            config.validate(),
            Err(DaemonError::ConfigValidationError(_))
        ));

        config.shutdown_grace_ms = 999;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = DaemonConfig::default();
        config.log_level = "loud".to_string();

        assert!(matches!(
            config.validate(),
            Err(DaemonError::ConfigValidationError(_))
        ));
    }

    #[test]
    fn test_absolutize_relative_paths() {
        let mut config = DaemonConfig::with_pid_file("run/d.pid");
        config.stdout = PathBuf::from("logs/out.log");

        config.absolutize(Path::new("/srv/app"));

        assert_eq!(config.pid_file, PathBuf::from("/srv/app/run/d.pid"));
        assert_eq!(config.stdout, PathBuf::from("/srv/app/logs/out.log"));
        assert_eq!(config.stdin, PathBuf::from("/dev/null"));
    }

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("DAEMONCTL_TEST_DIR", "/var/tmp");

        assert_eq!(
            expand_env_in_string("$DAEMONCTL_TEST_DIR/d.pid"),
            "/var/tmp/d.pid"
        );
        assert_eq!(
            expand_env_in_string("${DAEMONCTL_TEST_DIR}/out.log"),
            "/var/tmp/out.log"
        );
        assert_eq!(
            expand_env_in_string("$DAEMONCTL_TEST_UNSET_VAR/x"),
            "$DAEMONCTL_TEST_UNSET_VAR/x"
        );
        assert_eq!(expand_env_in_string("${unterminated"), "${unterminated");
        assert_eq!(expand_env_in_string("cost$"), "cost$");
    }

    #[test]
    fn test_parse_toml_partial() {
        let toml_content = r#"
            pid_file = "/tmp/d.pid"
            stdout = "/tmp/d.log"
            stop_max_attempts = 5
        "#;

        let config = DaemonConfig::parse_toml(toml_content).unwrap();
        assert_eq!(config.pid_file, PathBuf::from("/tmp/d.pid"));
        assert_eq!(config.stdout, PathBuf::from("/tmp/d.log"));
        assert_eq!(config.stderr, PathBuf::from("/dev/null"));
        assert_eq!(config.stop_max_attempts, 5);
        assert_eq!(config.stop_poll_interval_ms, 100);
    }

    #[test]
    fn test_parse_json_partial() {
        let json_content = r#"{ "pid_file": "/tmp/d.pid", "restart_grace_ms": 250 }"#;

        let config = DaemonConfig::parse_json(json_content).unwrap();
        assert_eq!(config.pid_file, PathBuf::from("/tmp/d.pid"));
        assert_eq!(config.restart_grace_ms, 250);
    }

    #[test]
    fn test_from_file_unsupported_format() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        fs::write(&config_path, "pid_file: /tmp/d.pid").unwrap();

        let result = DaemonConfig::from_file(&config_path);
        assert!(matches!(result, Err(DaemonError::InvalidConfig(_))));
    }
}
