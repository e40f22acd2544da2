//! Batch runner
//!
//! Runs a selected list of jobs as one batch bounded by a single deadline:
//! jobs are started one at a time in list order, then asynchronous jobs are
//! polled in sweeps until they all finish or the deadline passes. The result
//! is handed to the configured reporter.

use anyhow::Result;
use chrono::Local;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use sweep_core::Job;
use sweep_core::domain::batch::{BatchResult, JobException};
use sweep_core::domain::job::RunOutcome;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{GlobalSettings, JobRegistry};
use crate::report::Reporter;

/// Timing limits for a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerSettings {
    /// Sleep between poll sweeps
    pub inter_poll_sleep: Duration,
    /// Time after which no jobs are launched and no sweeps run
    pub max_total_runtime: Duration,
}

impl From<&GlobalSettings> for RunnerSettings {
    fn from(settings: &GlobalSettings) -> Self {
        Self {
            inter_poll_sleep: settings.inter_poll_sleep(),
            max_total_runtime: settings.max_total_runtime(),
        }
    }
}

/// Scheduling engine
pub struct Runner {
    settings: RunnerSettings,
    reporter: Arc<dyn Reporter>,
}

impl Runner {
    pub fn new(settings: RunnerSettings, reporter: Arc<dyn Reporter>) -> Self {
        Self { settings, reporter }
    }

    /// Runs every job on one of `schedules`, honoring skip decisions
    ///
    /// Unknown schedule names are rejected before anything runs.
    pub async fn run_schedules(
        &self,
        registry: &mut JobRegistry,
        schedules: &[String],
    ) -> Result<BatchResult> {
        let jobs = registry.take_schedules(schedules)?;
        info!(
            "Running {} job(s) for schedule(s): {}",
            jobs.len(),
            schedules.join(", ")
        );
        Ok(self.run_and_report(jobs, false).await)
    }

    /// Runs the named jobs, ignoring skip decisions
    ///
    /// Unknown job names are rejected before anything runs.
    pub async fn run_job_names(
        &self,
        registry: &mut JobRegistry,
        names: &[String],
    ) -> Result<BatchResult> {
        let jobs = registry.take_jobs(names)?;
        info!("Running {} job(s) by name: {}", jobs.len(), names.join(", "));
        Ok(self.run_and_report(jobs, true).await)
    }

    async fn run_and_report(&self, jobs: Vec<Box<dyn Job>>, force: bool) -> BatchResult {
        let result = self.run_jobs(jobs, force).await;
        if let Err(e) = self.reporter.report(&result) {
            error!("Failed to report batch result: {:#}", e);
        }
        result
    }

    /// Runs one batch over `jobs` in order
    ///
    /// With `force`, jobs are run even when their cron expression asked to
    /// skip them.
    pub async fn run_jobs(&self, jobs: Vec<Box<dyn Job>>, force: bool) -> BatchResult {
        let start_time = Local::now();
        let deadline = Instant::now() + self.settings.max_total_runtime;

        let mut finished: Vec<Box<dyn Job>> = Vec::new();
        let mut running: Vec<Box<dyn Job>> = Vec::new();
        let mut exceptions = HashMap::new();

        let mut queue = jobs.into_iter();
        while let Some(mut job) = queue.next() {
            if Instant::now() >= deadline {
                warn!(
                    "Max total runtime of {:?} exceeded; not starting {} remaining job(s)",
                    self.settings.max_total_runtime,
                    queue.len() + 1
                );
                running.push(job);
                running.extend(queue.by_ref());
                break;
            }

            if !force {
                if let Some(reason) = job.skip_reason() {
                    info!("Skipping job {}: {}", job.name(), reason);
                    finished.push(job);
                    continue;
                }
            }

            info!("Running job {}", job.name());
            match job.run().await {
                Ok(RunOutcome::Pending) => {
                    debug!("Job {} is running asynchronously", job.name());
                    running.push(job);
                }
                Ok(outcome) => {
                    info!(
                        "Job {} finished: {:?} (exit code {:?})",
                        job.name(),
                        outcome,
                        job.state().exit_code()
                    );
                    finished.push(job);
                }
                Err(e) => {
                    error!("Job {} raised an error: {:#}", job.name(), e);
                    exceptions.insert(job.name().to_string(), JobException::from_error(&e));
                    finished.push(job);
                }
            }
        }

        self.poll_until_done(&mut running, &mut finished, deadline)
            .await;

        if !running.is_empty() {
            warn!(
                "Batch ended with {} unfinished job(s): {}",
                running.len(),
                running
                    .iter()
                    .map(|j| j.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        BatchResult {
            finished,
            running,
            exceptions,
            start_time,
            end_time: Local::now(),
        }
    }

    /// Polls in-flight jobs once per sweep until none remain or the deadline passes
    async fn poll_until_done(
        &self,
        running: &mut Vec<Box<dyn Job>>,
        finished: &mut Vec<Box<dyn Job>>,
        deadline: Instant,
    ) {
        while !running.is_empty() && Instant::now() < deadline {
            let mut still_running = Vec::with_capacity(running.len());
            for mut job in running.drain(..) {
                if job.poll().await {
                    info!(
                        "Job {} finished (exit code {:?})",
                        job.name(),
                        job.state().exit_code()
                    );
                    finished.push(job);
                } else {
                    still_running.push(job);
                }
            }
            *running = still_running;

            if running.is_empty() {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let sleep = self.settings.inter_poll_sleep.min(deadline - now);
            debug!(
                "{} job(s) still running; sleeping {:?}",
                running.len(),
                sleep
            );
            tokio::time::sleep(sleep).await;
        }
    }
}
