//! Console reporter
//!
//! Prints the batch summary table to stdout with colored statuses, followed
//! by details for every job that needs attention. The full plain-text report
//! can also be written to a file.

use anyhow::{Context, Result};
use colored::*;
use std::path::PathBuf;
use sweep_core::domain::batch::BatchResult;
use sweep_core::domain::job::{JobStatus, format_duration};
use sweep_runner::GlobalSettings;
use sweep_runner::report::{JobRow, Reporter, job_detail, job_rows, render_text};
use tracing::info;

pub struct ConsoleReporter {
    only_if_problems: bool,
    report_path: Option<PathBuf>,
}

impl ConsoleReporter {
    pub fn from_settings(settings: &GlobalSettings) -> Self {
        Self {
            only_if_problems: settings.only_report_if_problems,
            report_path: settings.report_path.clone(),
        }
    }
}

impl Reporter for ConsoleReporter {
    fn report(&self, result: &BatchResult) -> Result<()> {
        if self.only_if_problems && !result.has_failures() {
            info!("only_report_if_problems is set and there were no problems; not reporting");
            return Ok(());
        }

        print_summary(result);

        if let Some(path) = &self.report_path {
            std::fs::write(path, render_text(result))
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("Report written to {}", path.display());
        }
        Ok(())
    }
}

fn print_summary(result: &BatchResult) {
    println!(
        "{}",
        format!(
            "Batch finished in {} ({} to {})",
            format_duration(Some(result.duration())),
            result.start_time.format("%Y-%m-%d %H:%M:%S"),
            result.end_time.format("%H:%M:%S")
        )
        .bold()
    );
    println!();

    let rows = job_rows(result);
    let width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0);
    for row in &rows {
        print_row(row, width);
    }

    let problems: Vec<_> = result
        .finished
        .iter()
        .chain(result.running.iter())
        .filter(|job| result.status_of(job.as_ref()).is_problem())
        .collect();
    if problems.is_empty() {
        return;
    }

    println!();
    println!("{}", "Problems:".bold());
    for job in problems {
        println!("{}", "─".repeat(80).dimmed());
        print!("{}", job_detail(result, job.as_ref()));
    }
    println!("{}", "─".repeat(80).dimmed());
}

fn print_row(row: &JobRow, width: usize) {
    println!(
        "  {} {:<width$}  {:<12} {:>10}  {}",
        status_marker(row.status),
        row.name,
        colorize_status(row.status),
        row.duration.dimmed(),
        row.message
    );
}

fn status_marker(status: JobStatus) -> ColoredString {
    match status {
        JobStatus::Succeeded => "✓".green(),
        JobStatus::Skipped => "-".yellow(),
        _ => "✗".red(),
    }
}

/// Colorize job status for display
fn colorize_status(status: JobStatus) -> ColoredString {
    let status_str = status.to_string();
    match status {
        JobStatus::Succeeded => status_str.green(),
        JobStatus::Skipped => status_str.yellow(),
        JobStatus::Unfinished => status_str.cyan(),
        JobStatus::Failed | JobStatus::TimedOut | JobStatus::SetupFailed | JobStatus::Errored => {
            status_str.red()
        }
    }
}
