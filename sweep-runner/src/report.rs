//! Batch reporting
//!
//! The engine hands every finished batch to a [`Reporter`]. This module also
//! flattens a batch into per-job rows and renders the plain-text report that
//! reporters print or store.

use chrono::Local;
use sweep_core::Job;
use sweep_core::domain::batch::BatchResult;
use sweep_core::domain::job::{JobStatus, format_duration};

/// Consumer of batch results
pub trait Reporter: Send + Sync {
    fn report(&self, result: &BatchResult) -> anyhow::Result<()>;
}

/// One line of the summary table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRow {
    pub name: String,
    pub status: JobStatus,
    /// Exit code, or the status when there is no meaningful exit code
    pub code: String,
    pub duration: String,
    pub message: String,
}

/// Rows for every job in the batch: finished jobs first, then unfinished
pub fn job_rows(result: &BatchResult) -> Vec<JobRow> {
    all_jobs(result).map(|job| row(result, job)).collect()
}

fn all_jobs(result: &BatchResult) -> impl Iterator<Item = &dyn Job> {
    result
        .finished
        .iter()
        .chain(result.running.iter())
        .map(|job| job.as_ref())
}

fn row(result: &BatchResult, job: &dyn Job) -> JobRow {
    let status = result.status_of(job);
    let state = job.state();
    let duration = format_duration(state.duration());

    let (code, duration, message) = match status {
        JobStatus::Errored => (
            "Exception".to_string(),
            duration,
            result
                .exception_for(job)
                .map(|e| e.message.clone())
                .unwrap_or_default(),
        ),
        JobStatus::Unfinished => ("Unfinished".to_string(), duration, "Unfinished".to_string()),
        JobStatus::Skipped => (
            "Skipped".to_string(),
            String::new(),
            job.skip_reason().unwrap_or_default().to_string(),
        ),
        _ => (
            state
                .exit_code()
                .map(|c| c.to_string())
                .unwrap_or_default(),
            duration,
            job.summary(),
        ),
    };

    JobRow {
        name: job.name().to_string(),
        status,
        code,
        duration,
        message,
    }
}

/// Detailed text block for one job
pub fn job_detail(result: &BatchResult, job: &dyn Job) -> String {
    let mut detail = format!("=== {} - {} ===\n", job.name(), job.report_description());
    match result.status_of(job) {
        JobStatus::Errored => {
            detail.push_str(&job.error_repr());
            if let Some(exception) = result.exception_for(job) {
                detail.push('\n');
                detail.push_str(&exception.trace);
                detail.push('\n');
            }
        }
        JobStatus::Unfinished => {
            detail.push_str(&job.error_repr());
            detail.push_str("JOB NOT FINISHED.\n");
        }
        JobStatus::Skipped => {
            detail.push_str(&format!(
                "Job Skipped: {}\n",
                job.skip_reason().unwrap_or_default()
            ));
        }
        _ => {
            let output = job.state().output().unwrap_or_default();
            detail.push_str(output);
            if !output.ends_with('\n') {
                detail.push('\n');
            }
        }
    }
    detail
}

/// Renders the full plain-text report
pub fn render_text(result: &BatchResult) -> String {
    let rows = job_rows(result);
    let name_width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0).max(8);
    let code_width = rows.iter().map(|r| r.code.len()).max().unwrap_or(0).max(9);
    let duration_width = rows.iter().map(|r| r.duration.len()).max().unwrap_or(0).max(8);

    let mut text = format!(
        "sweep run report generated {}\n",
        Local::now().format("%A, %Y-%m-%d %H:%M:%S %Z")
    );
    text.push_str(&format!(
        "Started: {}  Finished: {}  Total Duration: {}\n\n",
        result.start_time.format("%Y-%m-%d %H:%M:%S"),
        result.end_time.format("%Y-%m-%d %H:%M:%S"),
        format_duration(Some(result.duration()))
    ));

    text.push_str(&format!(
        "{:<name_width$}  {:<code_width$}  {:<duration_width$}  {}\n",
        "Job Name", "Exit Code", "Duration", "Message"
    ));
    for row in &rows {
        text.push_str(&format!(
            "{:<name_width$}  {:<code_width$}  {:<duration_width$}  {}\n",
            row.name, row.code, row.duration, row.message
        ));
    }

    for job in all_jobs(result) {
        text.push('\n');
        text.push_str(&job_detail(result, job));
    }
    text
}
