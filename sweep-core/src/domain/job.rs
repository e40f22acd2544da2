//! Job domain types
//!
//! `JobState` holds everything the engine and the reporter need to know
//! about a job regardless of how it executes: identity, lifecycle flags,
//! timestamps, exit code, captured output and the skip decision. Every job
//! variant embeds one and exposes it through the `Job` trait.

use chrono::{DateTime, Local, NaiveDateTime};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::domain::cron::CronSchedule;
use crate::error::CronError;

/// Exit code recorded when a local command exceeds its timeout
pub const EXIT_CODE_TIMEOUT: i32 = -2;

/// Exit code recorded when a job fails before its real command ran
pub const EXIT_CODE_SETUP_FAILURE: i32 = -3;

/// Result of calling `Job::run`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Ran synchronously and exited 0
    Succeeded,
    /// Ran synchronously and exited non-zero
    Failed,
    /// Launched asynchronously; completion is observed through `Job::poll`
    Pending,
}

impl RunOutcome {
    /// Maps a synchronous exit code to an outcome
    pub fn from_exit_code(exit_code: i32) -> Self {
        if exit_code == 0 {
            RunOutcome::Succeeded
        } else {
            RunOutcome::Failed
        }
    }
}

/// Classification of a job once a batch is over, used for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Skipped,
    Succeeded,
    Failed,
    TimedOut,
    SetupFailed,
    Errored,
    Unfinished,
}

impl JobStatus {
    /// Whether this status should be reported as a problem
    pub fn is_problem(&self) -> bool {
        !matches!(self, JobStatus::Skipped | JobStatus::Succeeded)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Skipped => write!(f, "Skipped"),
            JobStatus::Succeeded => write!(f, "Succeeded"),
            JobStatus::Failed => write!(f, "Failed"),
            JobStatus::TimedOut => write!(f, "Timed Out"),
            JobStatus::SetupFailed => write!(f, "Setup Failed"),
            JobStatus::Errored => write!(f, "Error"),
            JobStatus::Unfinished => write!(f, "Unfinished"),
        }
    }
}

/// State shared by all job variants
#[derive(Debug, Clone)]
pub struct JobState {
    name: String,
    schedule_name: String,
    started: bool,
    finished: bool,
    exit_code: Option<i32>,
    output: Option<String>,
    start_time: Option<DateTime<Local>>,
    finish_time: Option<DateTime<Local>>,
    skip_reason: Option<String>,
    summary_regex: Option<Regex>,
    cron_expression: Option<String>,
}

impl JobState {
    /// Creates the state for a job that has not started
    pub fn new(name: impl Into<String>, schedule_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schedule_name: schedule_name.into(),
            started: false,
            finished: false,
            exit_code: None,
            output: None,
            start_time: None,
            finish_time: None,
            skip_reason: None,
            summary_regex: None,
            cron_expression: None,
        }
    }

    /// Sets the summary regex
    ///
    /// The pattern is compiled in multi-line mode so `^` and `$` anchor at
    /// line boundaries within the output.
    pub fn with_summary_regex(mut self, pattern: &str) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(pattern).multi_line(true).build()?;
        self.summary_regex = Some(regex);
        Ok(self)
    }

    /// Evaluates a cron expression against `now` and records a skip reason
    /// when it does not match
    pub fn with_cron_expression(
        mut self,
        expression: &str,
        now: NaiveDateTime,
    ) -> Result<Self, CronError> {
        let schedule = CronSchedule::parse(expression)?;
        if !schedule.matches(&now) {
            self.skip_reason = Some(format!(
                "cron expression \"{}\" does not match {}",
                schedule.expression(),
                now.format("%Y-%m-%d %H:%M")
            ));
        }
        self.cron_expression = Some(schedule.expression().to_string());
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schedule_name(&self) -> &str {
        &self.schedule_name
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn start_time(&self) -> Option<DateTime<Local>> {
        self.start_time
    }

    pub fn finish_time(&self) -> Option<DateTime<Local>> {
        self.finish_time
    }

    pub fn skip_reason(&self) -> Option<&str> {
        self.skip_reason.as_deref()
    }

    pub fn cron_expression(&self) -> Option<&str> {
        self.cron_expression.as_deref()
    }

    /// Records that the job is starting. Must be called before any real work.
    pub fn mark_started(&mut self) {
        self.started = true;
        self.start_time = Some(Local::now());
    }

    /// Records completion with an exit code and captured output
    pub fn mark_finished(&mut self, exit_code: i32, output: impl Into<String>) {
        if !self.started {
            self.mark_started();
        }
        self.finished = true;
        self.finish_time = Some(Local::now());
        self.exit_code = Some(exit_code);
        self.output = Some(output.into());
    }

    /// Records a failure that happened before the job's real command ran
    pub fn fail_setup(&mut self, message: impl Into<String>) {
        self.mark_finished(EXIT_CODE_SETUP_FAILURE, message);
    }

    /// Time between start and finish, if both are known
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.start_time, self.finish_time) {
            (Some(start), Some(finish)) => Some(finish - start),
            _ => None,
        }
    }

    /// One-line status extracted from the output
    ///
    /// With a summary regex, the last match wins. Without one, or when it
    /// does not match, the last non-blank line of output is used.
    pub fn summary(&self) -> String {
        let output = match self.output.as_deref() {
            Some(output) => output,
            None => return String::new(),
        };

        if let Some(regex) = &self.summary_regex {
            if let Some(last) = regex.find_iter(output).last() {
                return last.as_str().to_string();
            }
        }

        output
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .to_string()
    }

    /// Detailed dump of the job for error reports
    ///
    /// `details` are variant specific `(label, value)` pairs inserted between
    /// the common fields and the output.
    pub fn error_repr(&self, details: &[(&str, String)]) -> String {
        let mut repr = format!(
            "Job \"{}\"\nSchedule Name: {}\nStarted: {}\nFinished: {}\nDuration: {}\n",
            self.name,
            self.schedule_name,
            self.started,
            self.finished,
            format_duration(self.duration()),
        );
        if let Some(code) = self.exit_code {
            repr.push_str(&format!("Exit Code: {}\n", code));
        }
        for (label, value) in details {
            repr.push_str(&format!("{}: {}\n", label, value));
        }
        repr.push_str(&format!(
            "Output: {}\n",
            self.output.as_deref().unwrap_or("None")
        ));
        repr
    }
}

/// Renders an optional duration as `1h 2m 3.456s`, or `-` when unknown
pub fn format_duration(duration: Option<chrono::Duration>) -> String {
    let duration = match duration {
        Some(d) => d,
        None => return "-".to_string(),
    };

    let millis = duration.num_milliseconds().max(0);
    let hours = millis / 3_600_000;
    let minutes = (millis % 3_600_000) / 60_000;
    let seconds = (millis % 60_000) as f64 / 1000.0;

    if hours > 0 {
        format!("{}h {}m {:.3}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:.3}s", minutes, seconds)
    } else {
        format!("{:.3}s", seconds)
    }
}
