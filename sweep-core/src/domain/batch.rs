//! Batch result types
//!
//! A batch is one run of the scheduling engine over a selected set of jobs.
//! Its result is what the reporting collaborator consumes.

use chrono::{DateTime, Local};
use std::collections::HashMap;

use crate::domain::job::{EXIT_CODE_SETUP_FAILURE, EXIT_CODE_TIMEOUT, JobStatus};
use crate::job::Job;

/// An error raised by a job's `run`, converted to data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobException {
    /// Display form of the error
    pub message: String,
    /// Error with its full cause chain (and backtrace, when captured)
    pub trace: String,
}

impl JobException {
    pub fn from_error(error: &anyhow::Error) -> Self {
        Self {
            message: error.to_string(),
            trace: format!("{:?}", error),
        }
    }
}

/// Everything produced by one batch
pub struct BatchResult {
    /// Jobs that reached a terminal state, in the order they got there
    pub finished: Vec<Box<dyn Job>>,
    /// Jobs still in flight, or never started, when the deadline passed
    pub running: Vec<Box<dyn Job>>,
    /// Errors raised by `run`, keyed by job name
    pub exceptions: HashMap<String, JobException>,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
}

impl BatchResult {
    /// Classifies a job from this batch for reporting
    pub fn status_of(&self, job: &dyn Job) -> JobStatus {
        let state = job.state();
        if self.exceptions.contains_key(state.name()) {
            return JobStatus::Errored;
        }
        if self.running.iter().any(|j| j.state().name() == state.name()) {
            return JobStatus::Unfinished;
        }
        if !state.is_finished() {
            return if state.skip_reason().is_some() && !state.is_started() {
                JobStatus::Skipped
            } else {
                JobStatus::Unfinished
            };
        }
        match state.exit_code() {
            Some(0) => JobStatus::Succeeded,
            Some(EXIT_CODE_TIMEOUT) => JobStatus::TimedOut,
            Some(EXIT_CODE_SETUP_FAILURE) => JobStatus::SetupFailed,
            _ => JobStatus::Failed,
        }
    }

    /// Whether anything in the batch should be reported as a failure: any
    /// exception, any unfinished job, or any non-zero exit code on a job
    /// that was not skipped
    pub fn has_failures(&self) -> bool {
        if !self.exceptions.is_empty() || !self.running.is_empty() {
            return true;
        }
        self.finished
            .iter()
            .any(|job| self.status_of(job.as_ref()).is_problem())
    }

    /// Wall-clock duration of the batch
    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }

    /// Looks up the exception recorded for a job, if any
    pub fn exception_for(&self, job: &dyn Job) -> Option<&JobException> {
        self.exceptions.get(job.state().name())
    }
}

impl std::fmt::Debug for BatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |jobs: &[Box<dyn Job>]| -> Vec<String> {
            jobs.iter().map(|j| j.state().name().to_string()).collect()
        };
        f.debug_struct("BatchResult")
            .field("finished", &names(&self.finished))
            .field("running", &names(&self.running))
            .field("exceptions", &self.exceptions.keys().collect::<Vec<_>>())
            .field("start_time", &self.start_time)
            .field("end_time", &self.end_time)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::{JobState, RunOutcome};
    use anyhow::Context;
    use async_trait::async_trait;

    struct StaticJob {
        state: JobState,
    }

    #[async_trait]
    impl Job for StaticJob {
        fn state(&self) -> &JobState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut JobState {
            &mut self.state
        }

        async fn run(&mut self) -> anyhow::Result<RunOutcome> {
            Ok(RunOutcome::Succeeded)
        }

        fn report_description(&self) -> String {
            "static".to_string()
        }
    }

    fn job(name: &str, exit_code: Option<i32>) -> Box<dyn Job> {
        let mut state = JobState::new(name, "sched");
        if let Some(code) = exit_code {
            state.mark_finished(code, "");
        }
        Box::new(StaticJob { state })
    }

    fn result(finished: Vec<Box<dyn Job>>, running: Vec<Box<dyn Job>>) -> BatchResult {
        let now = Local::now();
        BatchResult {
            finished,
            running,
            exceptions: HashMap::new(),
            start_time: now,
            end_time: now,
        }
    }

    #[test]
    fn test_status_classification() {
        let batch = result(
            vec![
                job("ok", Some(0)),
                job("bad", Some(1)),
                job("slow", Some(EXIT_CODE_TIMEOUT)),
                job("setup", Some(EXIT_CODE_SETUP_FAILURE)),
            ],
            vec![job("pending", None)],
        );
        let statuses: Vec<JobStatus> = batch
            .finished
            .iter()
            .map(|j| batch.status_of(j.as_ref()))
            .collect();
        assert_eq!(
            statuses,
            vec![
                JobStatus::Succeeded,
                JobStatus::Failed,
                JobStatus::TimedOut,
                JobStatus::SetupFailed
            ]
        );
        assert_eq!(
            batch.status_of(batch.running[0].as_ref()),
            JobStatus::Unfinished
        );
    }

    #[test]
    fn test_no_failures() {
        let batch = result(vec![job("ok", Some(0))], vec![]);
        assert!(!batch.has_failures());
    }

    #[test]
    fn test_failures() {
        assert!(result(vec![job("bad", Some(1))], vec![]).has_failures());
        assert!(result(vec![], vec![job("pending", None)]).has_failures());

        let mut batch = result(vec![job("err", None)], vec![]);
        let err = Err::<(), _>(std::io::Error::other("unreachable"))
            .context("launch failed")
            .unwrap_err();
        batch
            .exceptions
            .insert("err".to_string(), JobException::from_error(&err));
        assert!(batch.has_failures());
        assert_eq!(
            batch.status_of(batch.finished[0].as_ref()),
            JobStatus::Errored
        );
        let exc = batch.exception_for(batch.finished[0].as_ref()).unwrap();
        assert_eq!(exc.message, "launch failed");
        assert!(exc.trace.contains("unreachable"));
    }
}
