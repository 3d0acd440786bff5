// Integration test for configuration file support

use daemonctl::config::DaemonConfig;
use daemonctl::error::DaemonError;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_load_toml_config() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("daemon.toml");

    let toml_content = r#"
        pid_file = "/tmp/worker.pid"
        stdin = "/dev/null"
        stdout = "/tmp/worker.log"
        stderr = "/tmp/worker.err"
        stop_poll_interval_ms = 250
        stop_max_attempts = 40
        shutdown_grace_ms = 3000
        restart_grace_ms = 500
        heartbeat_interval_secs = 3
        log_level = "debug"
    "#;

    fs::write(&config_path, toml_content).unwrap();

    let config = DaemonConfig::from_file(&config_path).unwrap();
    assert_eq!(config.pid_file, PathBuf::from("/tmp/worker.pid"));
    assert_eq!(config.stdin, PathBuf::from("/dev/null"));
    assert_eq!(config.stdout, PathBuf::from("/tmp/worker.log"));
    assert_eq!(config.stderr, PathBuf::from("/tmp/worker.err"));
    assert_eq!(config.stop_poll_interval_ms, 250);
    assert_eq!(config.stop_max_attempts, 40);
    assert_eq!(config.shutdown_grace_ms, 3000);
    assert_eq!(config.restart_grace_ms, 500);
    assert_eq!(config.heartbeat_interval_secs, 3);
    assert_eq!(config.log_level, "debug");
}

#[test]
fn test_load_json_config_with_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("daemon.json");

    fs::write(&config_path, r#"{ "pid_file": "/tmp/worker.pid" }"#).unwrap();

    let config = DaemonConfig::from_file(&config_path).unwrap();
    assert_eq!(
        config,
        DaemonConfig {
            pid_file: PathBuf::from("/tmp/worker.pid"),
            ..DaemonConfig::default()
        }
    );
}

#[test]
fn test_load_config_expands_env_vars() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("daemon.toml");
    std::env::set_var("DAEMONCTL_IT_RUN_DIR", temp_dir.path());

    fs::write(
        &config_path,
        r#"
            pid_file = "${DAEMONCTL_IT_RUN_DIR}/d.pid"
            stdout = "$DAEMONCTL_IT_RUN_DIR/out.log"
        "#,
    )
    .unwrap();

    let config = DaemonConfig::from_file(&config_path).unwrap();
    assert_eq!(config.pid_file, temp_dir.path().join("d.pid"));
    assert_eq!(config.stdout, temp_dir.path().join("out.log"));
}

#[test]
fn test_load_invalid_toml() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("daemon.toml");

    fs::write(&config_path, "pid_file = [not toml").unwrap();

    let result = DaemonConfig::from_file(&config_path);
    assert!(matches!(result, Err(DaemonError::InvalidConfig(_))));
}

#[test]
fn test_load_config_validated_after_overrides() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("daemon.json");

    fs::write(
        &config_path,
        r#"{ "pid_file": "/tmp/same.log", "stderr": "/tmp/same.log" }"#,
    )
    .unwrap();

    // Loading succeeds; validation is a separate step run after overrides
    let mut config = DaemonConfig::from_file(&config_path).unwrap();
    assert!(matches!(
        config.validate(),
        Err(DaemonError::ConfigValidationError(_))
    ));

    config.pid_file = PathBuf::from("/tmp/override.pid");
    assert!(config.validate().is_ok());
}

#[test]
fn test_load_missing_file() {
    let temp_dir = TempDir::new().unwrap();

    let result = DaemonConfig::from_file(&temp_dir.path().join("absent.toml"));
    assert!(matches!(result, Err(DaemonError::ConfigError(_))));
}
