//! Output formatting utilities for the crm-jobs CLI.

use colored::*;
use crmrund_core::jobs::{JobRun, JobStatus};

/// Print a success message to stdout.
pub fn print_success(msg: &str) {
    println!("{} {}", "[OK]".green().bold(), msg);
}

/// Print an error message to stderr.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), msg);
}

/// Print a warning message to stdout.
pub fn print_warning(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

/// Print key-value details to the terminal.
pub fn print_detail(key: &str, value: &str) {
    println!("  {}: {}", key.cyan(), value);
}

/// Print a finished job run: status line plus counters.
pub fn print_run(run: &JobRun) {
    match run.status {
        JobStatus::Completed => print_success(&format!("{} completed", run.job)),
        JobStatus::Degraded => print_warning(&format!("{} degraded", run.job)),
        _ => print_error(&format!("{} failed", run.job)),
    }
    print_detail("summary", &run.summary);
    print_detail("examined", &run.examined.to_string());
    print_detail("affected", &run.affected.to_string());
    if run.failed > 0 {
        print_detail("failed", &run.failed.to_string());
    }
}
