//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod inspect;
mod run;

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::Path;
use std::process::ExitCode;
use sweep_runner::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate the configuration, then list the jobs
    Validate,
    /// List the schedule names defined in the configuration
    ListSchedules,
    /// Run every job on the given schedules (cron skips apply)
    Run {
        #[arg(required = true)]
        schedules: Vec<String>,
    },
    /// Run the named jobs, even if their cron expression would skip them
    RunJobs {
        #[arg(required = true)]
        jobs: Vec<String>,
    },
}

/// Handle a CLI command
///
/// # Arguments
/// * `command` - The command to execute
/// * `config_path` - Configuration file or directory
///
/// # Returns
/// The process exit code: non-zero when a batch had failures
pub async fn handle_command(command: Commands, config_path: &Path) -> Result<ExitCode> {
    let config = Config::load(config_path)
        .with_context(|| format!("Invalid configuration at {}", config_path.display()))?;

    match command {
        Commands::Validate => inspect::validate(&config),
        Commands::ListSchedules => inspect::list_schedules(&config),
        Commands::Run { schedules } => run::run_schedules(config, &schedules).await,
        Commands::RunJobs { jobs } => run::run_jobs(config, &jobs).await,
    }
}
