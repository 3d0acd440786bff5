// Output formatting and display for CLI

use crate::daemon::{DaemonStatus, ProcessState, StopOutcome};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print a success message
pub fn print_success_msg(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message to stderr
pub fn print_error(error: &str) {
    eprintln!("{} {}", "✗ Error:".red().bold(), error);
}

/// Print the daemon status
pub fn print_status(status: &DaemonStatus) {
    let line = describe_status(status);
    match status.state {
        ProcessState::Running { .. } => println!("{}", line.green().bold()),
        ProcessState::Stopped => println!("{}", line.red().bold()),
        ProcessState::Stale { .. } => println!("{}", line.yellow().bold()),
    }
    println!("  {}: {}", "PID file".bold(), status.pid_file.display());
}

fn describe_status(status: &DaemonStatus) -> String {
    match status.state {
        ProcessState::Running { pid } => format!("✓ Daemon is running (PID: {})", pid),
        ProcessState::Stopped => "✗ Daemon is not running".to_string(),
        ProcessState::Stale { pid } => {
            format!("✗ Daemon is not running (stale pid file names PID {})", pid)
        }
    }
}

/// One-line confirmation for a completed stop
pub fn describe_stop(outcome: &StopOutcome) -> String {
    if outcome.stale {
        format!(
            "Daemon was not running (PID {} gone); removed stale pid file",
            outcome.pid
        )
    } else {
        format!("Daemon stopped (PID: {})", outcome.pid)
    }
}

/// Create a spinner for operations that poll
pub fn create_progress_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Finish a progress bar with success
pub fn finish_progress_success(pb: ProgressBar, message: &str) {
    pb.finish_with_message(format!("{} {}", "✓".green(), message));
}

/// Finish a progress bar with error
pub fn finish_progress_error(pb: ProgressBar, message: &str) {
    pb.finish_with_message(format!("{} {}", "✗".red(), message));
}
