//! Job materialization and selection
//!
//! Turns validated job definitions into runnable `Box<dyn Job>` values wired
//! to their backends, and selects them by schedule or by name.

use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use sweep_client::TaskApiClient;
use sweep_core::Job;
use tracing::{debug, info};

use super::{Config, ConfigError, GlobalSettings, JobDefinition, JobKind};
use crate::container::{CliContainerRuntime, ContainerRuntime};
use crate::jobs::{DockerExec, EcsDockerExec, LocalCommand, RemoteTask};
use crate::repository::{HttpTaskRepository, TaskRepository};

/// Request timeout for calls to the remote task service
const TASK_API_TIMEOUT: Duration = Duration::from_secs(30);

/// External services jobs are wired to
#[derive(Clone)]
pub struct Backends {
    pub tasks: Option<Arc<dyn TaskRepository>>,
    pub containers: Arc<dyn ContainerRuntime>,
}

impl Backends {
    /// Builds the standard HTTP and CLI backends from global settings
    pub fn from_settings(settings: &GlobalSettings) -> Result<Self, ConfigError> {
        let tasks = match &settings.task_api_url {
            Some(url) => {
                debug!("Using task API at {}", url);
                let client = TaskApiClient::with_timeout(url.as_str(), TASK_API_TIMEOUT)?;
                Some(Arc::new(HttpTaskRepository::new(client)) as Arc<dyn TaskRepository>)
            }
            None => None,
        };

        Ok(Self {
            tasks,
            containers: Arc::new(CliContainerRuntime::new(&settings.container_runtime)),
        })
    }
}

/// The materialized jobs of one configuration, in configuration order
pub struct JobRegistry {
    jobs: Vec<Box<dyn Job>>,
}

impl JobRegistry {
    /// Materializes every job in `config`, evaluating cron expressions at `now`
    pub fn build(config: &Config, backends: &Backends, now: NaiveDateTime) -> Result<Self, ConfigError> {
        let jobs = config
            .jobs
            .iter()
            .map(|definition| materialize(definition, backends, now))
            .collect::<Result<Vec<_>, _>>()?;

        info!("Created {} job instance(s)", jobs.len());
        Ok(Self { jobs })
    }

    /// Wraps already-built jobs
    pub fn from_jobs(jobs: Vec<Box<dyn Job>>) -> Self {
        Self { jobs }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn jobs(&self) -> impl Iterator<Item = &dyn Job> {
        self.jobs.iter().map(|job| job.as_ref())
    }

    /// All distinct schedule names, sorted
    pub fn schedule_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .jobs
            .iter()
            .map(|job| job.schedule_name().to_string())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Removes and returns the jobs on any of `schedules`, in configuration order
    pub fn take_schedules(&mut self, schedules: &[String]) -> Result<Vec<Box<dyn Job>>, ConfigError> {
        let known: HashSet<&str> = self.jobs.iter().map(|j| j.schedule_name()).collect();
        let unknown: Vec<String> = schedules
            .iter()
            .filter(|name| !known.contains(name.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(ConfigError::UnknownSchedules(unknown));
        }

        Ok(self.take_where(|job| schedules.iter().any(|s| s == job.schedule_name())))
    }

    /// Removes and returns the named jobs, in configuration order
    pub fn take_jobs(&mut self, names: &[String]) -> Result<Vec<Box<dyn Job>>, ConfigError> {
        let known: HashSet<&str> = self.jobs.iter().map(|j| j.name()).collect();
        let unknown: Vec<String> = names
            .iter()
            .filter(|name| !known.contains(name.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(ConfigError::UnknownJobs(unknown));
        }

        Ok(self.take_where(|job| names.iter().any(|n| n == job.name())))
    }

    fn take_where<F>(&mut self, wanted: F) -> Vec<Box<dyn Job>>
    where
        F: Fn(&dyn Job) -> bool,
    {
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.jobs)
            .into_iter()
            .partition(|job| wanted(job.as_ref()));
        self.jobs = kept;
        taken
    }
}

/// Builds the runnable job for one definition
pub fn materialize(
    definition: &JobDefinition,
    backends: &Backends,
    now: NaiveDateTime,
) -> Result<Box<dyn Job>, ConfigError> {
    let state = definition.job_state(now)?;
    if let Some(reason) = state.skip_reason() {
        debug!("Job {} will be skipped: {}", definition.name, reason);
    }

    let job: Box<dyn Job> = match &definition.kind {
        JobKind::LocalCommand(spec) => Box::new(LocalCommand::new(state, spec.clone())),
        JobKind::RemoteTask(spec) => {
            let tasks = backends.tasks.clone().ok_or_else(|| ConfigError::MissingSetting {
                setting: "task_api_url",
                reason: format!("job \"{}\" is a RemoteTask", definition.name),
            })?;
            Box::new(RemoteTask::new(state, spec.clone(), tasks))
        }
        JobKind::DockerExec(spec) => Box::new(DockerExec::new(
            state,
            spec.clone(),
            Arc::clone(&backends.containers),
        )),
        JobKind::EcsDockerExec(spec) => Box::new(EcsDockerExec::new(
            state,
            spec.clone(),
            Arc::clone(&backends.containers),
        )),
    };
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeRuntime;
    use chrono::NaiveDate;

    const CONFIG: &str = r#"
jobs:
  - {name: a, schedule: daily, class_name: LocalCommand, command: 'true'}
  - {name: b, schedule: hourly, class_name: DockerExec, container_name: db, command: 'true'}
  - {name: c, schedule: daily, class_name: EcsDockerExec, task_definition_family: f, container_name: app, command: 'true', cron_expression: '0 3 * * *'}
  - {name: d, schedule: weekly, class_name: LocalCommand, command: 'true'}
"#;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn backends() -> Backends {
        Backends {
            tasks: None,
            containers: Arc::new(FakeRuntime::new(vec![])),
        }
    }

    fn registry() -> JobRegistry {
        let config = Config::from_yaml_str(CONFIG, "test").unwrap();
        JobRegistry::build(&config, &backends(), now()).unwrap()
    }

    fn names(jobs: &[Box<dyn Job>]) -> Vec<&str> {
        jobs.iter().map(|j| j.name()).collect()
    }

    #[test]
    fn test_build_keeps_order_and_evaluates_cron() {
        let registry = registry();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.schedule_names(), vec!["daily", "hourly", "weekly"]);

        let skipped: Vec<&str> = registry
            .jobs()
            .filter(|j| j.skip_reason().is_some())
            .map(|j| j.name())
            .collect();
        assert_eq!(skipped, vec!["c"]);
    }

    #[test]
    fn test_take_schedules() {
        let mut registry = registry();
        let jobs = registry
            .take_schedules(&["weekly".to_string(), "daily".to_string()])
            .unwrap();
        assert_eq!(names(&jobs), vec!["a", "c", "d"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_take_jobs() {
        let mut registry = registry();
        let jobs = registry
            .take_jobs(&["d".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(names(&jobs), vec!["b", "d"]);
    }

    #[test]
    fn test_unknown_names_are_errors() {
        let mut registry = registry();
        assert!(matches!(
            registry.take_schedules(&["monthly".to_string()]),
            Err(ConfigError::UnknownSchedules(names)) if names == vec!["monthly".to_string()]
        ));
        assert!(matches!(
            registry.take_jobs(&["a".to_string(), "zz".to_string()]),
            Err(ConfigError::UnknownJobs(_))
        ));
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_remote_task_without_backend() {
        let config = Config::from_yaml_str(
            "jobs:\n  - {name: r, schedule: s, class_name: RemoteTask, cluster: c, task_definition_family: f}\n",
            "test",
        )
        .unwrap();
        assert!(matches!(
            JobRegistry::build(&config, &backends(), now()),
            Err(ConfigError::MissingSetting { .. })
        ));
    }

    #[test]
    fn test_backends_from_settings() {
        let settings = GlobalSettings {
            task_api_url: Some("http://tasks.internal".to_string()),
            container_runtime: "podman".to_string(),
            ..GlobalSettings::default()
        };
        let backends = Backends::from_settings(&settings).unwrap();
        assert!(backends.tasks.is_some());

        let backends = Backends::from_settings(&GlobalSettings::default()).unwrap();
        assert!(backends.tasks.is_none());
    }
}
