//! The `Job` trait
//!
//! Every job variant (local command, remote task, container exec) implements
//! this trait. The engine only ever talks to jobs through it.

use async_trait::async_trait;

use crate::domain::job::{JobState, RunOutcome};

/// A schedulable unit of work
///
/// Lifecycle: `run` is called at most once per batch. Synchronous variants
/// finish inside `run`; asynchronous variants return `RunOutcome::Pending`
/// and are completed by later calls to `poll`.
#[async_trait]
pub trait Job: Send + Sync {
    /// Shared job state
    fn state(&self) -> &JobState;

    /// Mutable access to the shared job state
    fn state_mut(&mut self) -> &mut JobState;

    /// Starts the job
    ///
    /// Implementations must mark the job started before attempting any real
    /// work. An `Err` means the job could not even be attempted (for example
    /// the backend is unreachable); the engine records it and moves on.
    async fn run(&mut self) -> anyhow::Result<RunOutcome>;

    /// Checks once whether an asynchronous job has completed
    ///
    /// Never sleeps and never fails: backend errors are logged and retried on
    /// the next call. Returns `true` once the job is finished, including on
    /// every call after completion.
    async fn poll(&mut self) -> bool {
        self.state().is_finished()
    }

    /// One-line description for reports
    fn report_description(&self) -> String;

    /// Detailed dump of the job for error reports
    fn error_repr(&self) -> String {
        self.state().error_repr(&[])
    }

    fn name(&self) -> &str {
        self.state().name()
    }

    fn schedule_name(&self) -> &str {
        self.state().schedule_name()
    }

    fn skip_reason(&self) -> Option<&str> {
        self.state().skip_reason()
    }

    /// One-line status extracted from the job's output
    fn summary(&self) -> String {
        self.state().summary()
    }
}
