//! Batch run commands

use anyhow::Result;
use chrono::Local;
use std::process::ExitCode;
use std::sync::Arc;
use sweep_core::domain::batch::BatchResult;
use sweep_runner::{Backends, Config, JobRegistry, Runner, RunnerSettings};
use tracing::info;

use crate::reporter::ConsoleReporter;

/// Runs every job on `schedules`
pub async fn run_schedules(config: Config, schedules: &[String]) -> Result<ExitCode> {
    let (runner, mut registry) = prepare(&config)?;
    let result = runner.run_schedules(&mut registry, schedules).await?;
    Ok(exit_code(&result))
}

/// Runs the named jobs, ignoring cron skips
pub async fn run_jobs(config: Config, names: &[String]) -> Result<ExitCode> {
    let (runner, mut registry) = prepare(&config)?;
    let result = runner.run_job_names(&mut registry, names).await?;
    Ok(exit_code(&result))
}

fn prepare(config: &Config) -> Result<(Runner, JobRegistry)> {
    let backends = Backends::from_settings(&config.global)?;
    let registry = JobRegistry::build(config, &backends, Local::now().naive_local())?;
    info!("Materialized {} job(s)", registry.len());

    let reporter = Arc::new(ConsoleReporter::from_settings(&config.global));
    let runner = Runner::new(RunnerSettings::from(&config.global), reporter);
    Ok((runner, registry))
}

fn exit_code(result: &BatchResult) -> ExitCode {
    if result.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
