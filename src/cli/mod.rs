// CLI module - User-facing command-line interface

pub mod output;

use crate::config::DaemonConfig;
use crate::daemon::DaemonManager;
use crate::error::{DaemonError, Result};
use crate::worker::HeartbeatWorker;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// daemonctl - run a worker as a detached background daemon
#[derive(Parser, Debug)]
#[command(name = "daemonctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (.toml or .json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// PID file marking the running daemon
    #[arg(long, global = true)]
    pid_file: Option<PathBuf>,

    /// File the daemon reads standard input from
    #[arg(long, global = true)]
    stdin: Option<PathBuf>,

    /// File the daemon appends standard output to
    #[arg(long, global = true)]
    stdout: Option<PathBuf>,

    /// File the daemon appends standard error to
    #[arg(long, global = true)]
    stderr: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Detach into the background and run the worker
    Start,
    /// Terminate the running daemon
    Stop,
    /// Stop the daemon if running, then start it again
    Restart,
    /// Report whether the daemon is running
    Status,
}

impl Cli {
    /// Run the CLI application
    pub fn run() -> Result<()> {
        let cli = Cli::parse();
        cli.execute()
    }

    /// Execute the parsed command
    fn execute(&self) -> Result<()> {
        let config = self.build_config()?;
        init_tracing(&config.log_level);

        let manager = DaemonManager::new(config);
        let worker = || HeartbeatWorker::stdout(manager.config().heartbeat_interval());

        match self.command {
            Commands::Start => {
                output::print_info(&format!(
                    "Starting daemon (pid file: {})",
                    manager.pid_file().path().display()
                ));
                manager.start(worker())
            }

            Commands::Stop => {
                let pb = output::create_progress_bar("Stopping daemon...");
                match manager.stop() {
                    Ok(outcome) => {
                        output::finish_progress_success(pb, &output::describe_stop(&outcome));
                        Ok(())
                    }
                    Err(e) => {
                        output::finish_progress_error(pb, "Stop failed");
                        Err(e)
                    }
                }
            }

            Commands::Restart => manager.restart(worker(), |outcome| match outcome {
                Some(outcome) => output::print_success_msg(&output::describe_stop(outcome)),
                None => output::print_info("Daemon not running; starting it"),
            }),

            Commands::Status => {
                output::print_status(&manager.status()?);
                Ok(())
            }
        }
    }

    /// Build the daemon configuration: file or defaults, then flag overrides
    fn build_config(&self) -> Result<DaemonConfig> {
        let mut config = match &self.config {
            Some(path) => DaemonConfig::from_file(path)?,
            None => DaemonConfig::default(),
        };

        if let Some(path) = &self.pid_file {
            config.pid_file = path.clone();
        }
        if let Some(path) = &self.stdin {
            config.stdin = path.clone();
        }
        if let Some(path) = &self.stdout {
            config.stdout = path.clone();
        }
        if let Some(path) = &self.stderr {
            config.stderr = path.clone();
        }

        let cwd = std::env::current_dir().map_err(|e| {
            DaemonError::ConfigError(format!("Failed to determine current directory: {}", e))
        })?;
        config.absolutize(&cwd);
        config.validate()?;

        Ok(config)
    }
}

/// Install the global tracing subscriber. Writes to stderr, which inside the
/// daemon is the redirected error stream.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .try_init();
}
