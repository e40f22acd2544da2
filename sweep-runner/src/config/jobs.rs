//! Job definitions
//!
//! Each job in the configuration is a map with the common fields (`name`,
//! `schedule`, optional `summary_regex` and `cron_expression`) plus the
//! variant fields selected by `class_name`.

use serde::Deserialize;
use sweep_core::domain::cron::CronSchedule;
use sweep_core::domain::job::JobState;

use super::ConfigError;
use crate::jobs::{DockerExecSpec, EcsDockerExecSpec, LocalCommandSpec, RemoteTaskSpec};

/// One job as written in the configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    pub schedule: String,
    #[serde(default)]
    pub summary_regex: Option<String>,
    #[serde(default)]
    pub cron_expression: Option<String>,
    #[serde(flatten)]
    pub kind: JobKind,
}

/// Variant-specific part of a job definition
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "class_name")]
pub enum JobKind {
    LocalCommand(LocalCommandSpec),
    RemoteTask(RemoteTaskSpec),
    DockerExec(DockerExecSpec),
    EcsDockerExec(EcsDockerExecSpec),
}

impl JobKind {
    pub fn class_name(&self) -> &'static str {
        match self {
            JobKind::LocalCommand(_) => "LocalCommand",
            JobKind::RemoteTask(_) => "RemoteTask",
            JobKind::DockerExec(_) => "DockerExec",
            JobKind::EcsDockerExec(_) => "EcsDockerExec",
        }
    }
}

impl JobDefinition {
    /// Checks everything about this job that can be checked without running it
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("job name cannot be empty"));
        }
        if self.schedule.trim().is_empty() {
            return Err(ConfigError::invalid(format!(
                "job \"{}\" has an empty schedule",
                self.name
            )));
        }
        if let Some(expression) = &self.cron_expression {
            CronSchedule::parse(expression).map_err(|source| ConfigError::InvalidCron {
                job: self.name.clone(),
                source,
            })?;
        }
        if let Some(pattern) = &self.summary_regex {
            regex::Regex::new(pattern).map_err(|source| ConfigError::InvalidRegex {
                job: self.name.clone(),
                source,
            })?;
        }

        match &self.kind {
            JobKind::LocalCommand(spec) => {
                let has_command = spec.command.as_ref().is_some_and(|c| !c.is_empty());
                if !has_command && spec.script_source.is_none() {
                    return Err(ConfigError::invalid(format!(
                        "job \"{}\" needs a command or a script_source",
                        self.name
                    )));
                }
                if spec.timeout == Some(0) {
                    return Err(ConfigError::invalid(format!(
                        "job \"{}\": timeout must be greater than 0",
                        self.name
                    )));
                }
            }
            JobKind::RemoteTask(spec) => {
                if spec.cluster.is_empty() || spec.task_definition_family.is_empty() {
                    return Err(ConfigError::invalid(format!(
                        "job \"{}\" needs a cluster and a task_definition_family",
                        self.name
                    )));
                }
            }
            JobKind::DockerExec(spec) => {
                if spec.container_name.is_empty() || spec.exec.command.is_empty() {
                    return Err(ConfigError::invalid(format!(
                        "job \"{}\" needs a container_name and a command",
                        self.name
                    )));
                }
            }
            JobKind::EcsDockerExec(spec) => {
                if spec.task_definition_family.is_empty()
                    || spec.container_name.is_empty()
                    || spec.exec.command.is_empty()
                {
                    return Err(ConfigError::invalid(format!(
                        "job \"{}\" needs a task_definition_family, a container_name and a command",
                        self.name
                    )));
                }
            }
        }

        let argv_command = match &self.kind {
            JobKind::LocalCommand(spec) if !spec.shell && spec.script_source.is_none() => {
                spec.command.as_ref()
            }
            JobKind::DockerExec(spec) => Some(&spec.exec.command),
            JobKind::EcsDockerExec(spec) => Some(&spec.exec.command),
            _ => None,
        };
        if let Some(command) = argv_command {
            command
                .to_argv()
                .map_err(|e| ConfigError::invalid(format!("job \"{}\": {}", self.name, e)))?;
        }

        Ok(())
    }

    /// Builds the shared job state, evaluating the cron expression at `now`
    pub fn job_state(&self, now: chrono::NaiveDateTime) -> Result<JobState, ConfigError> {
        let mut state = JobState::new(&self.name, &self.schedule);
        if let Some(pattern) = &self.summary_regex {
            state = state
                .with_summary_regex(pattern)
                .map_err(|source| ConfigError::InvalidRegex {
                    job: self.name.clone(),
                    source,
                })?;
        }
        if let Some(expression) = &self.cron_expression {
            state = state
                .with_cron_expression(expression, now)
                .map_err(|source| ConfigError::InvalidCron {
                    job: self.name.clone(),
                    source,
                })?;
        }
        Ok(state)
    }
}
