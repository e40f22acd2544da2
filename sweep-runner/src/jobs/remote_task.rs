//! Remote task job
//!
//! Launches a task through the remote task service and completes
//! asynchronously: `run` only launches, `poll` checks the task status and,
//! once the task has stopped, gathers every container's exit code and logs.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use sweep_core::Job;
use sweep_core::domain::job::{JobState, RunOutcome};
use sweep_core::dto::task::{ContainerOverride, LaunchTaskRequest, TaskDescription};
use tracing::{debug, info, warn};

use crate::repository::TaskRepository;

/// Configuration of a remote task job
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteTaskSpec {
    pub cluster: String,
    pub task_definition_family: String,
    #[serde(default)]
    pub overrides: Vec<ContainerOverride>,
    #[serde(default)]
    pub started_by: Option<String>,
}

/// A job that runs as a task on the remote task service
pub struct RemoteTask {
    state: JobState,
    spec: RemoteTaskSpec,
    repository: Arc<dyn TaskRepository>,
    task_id: Option<String>,
    stopped_reason: Option<String>,
}

impl RemoteTask {
    pub fn new(state: JobState, spec: RemoteTaskSpec, repository: Arc<dyn TaskRepository>) -> Self {
        Self {
            state,
            spec,
            repository,
            task_id: None,
            stopped_reason: None,
        }
    }

    /// Identifier of the launched task, once `run` succeeded
    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    /// Collects exit code and logs of a stopped task
    async fn collect_results(&self, task_id: &str, task: &TaskDescription) -> (i32, String) {
        // A container without an exit code never ran to completion
        let exit_code = task
            .containers
            .iter()
            .map(|c| c.exit_code.unwrap_or(1))
            .max()
            .unwrap_or(1);

        let mut output = String::new();
        if let Some(reason) = &task.stopped_reason {
            output.push_str(&format!("Task stopped: {}\n", reason));
        }
        for container in &task.containers {
            let code = container
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "None".to_string());
            output.push_str(&format!(
                "--- container {} (exit code {}) ---\n",
                container.name, code
            ));
            if let Some(reason) = &container.reason {
                output.push_str(&format!("Reason: {}\n", reason));
            }
            match self
                .repository
                .fetch_container_logs(task_id, &container.name)
                .await
            {
                Ok(logs) => {
                    output.push_str(&logs);
                    if !logs.ends_with('\n') {
                        output.push('\n');
                    }
                }
                Err(e) => {
                    warn!(
                        "Job {}: failed to fetch logs of container {}: {:#}",
                        self.state.name(),
                        container.name,
                        e
                    );
                    output.push_str(&format!("Failed to fetch logs: {:#}\n", e));
                }
            }
        }

        (exit_code, output)
    }
}

#[async_trait]
impl Job for RemoteTask {
    fn state(&self) -> &JobState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut JobState {
        &mut self.state
    }

    async fn run(&mut self) -> anyhow::Result<RunOutcome> {
        self.state.mark_started();

        let request = LaunchTaskRequest {
            cluster: self.spec.cluster.clone(),
            task_definition_family: self.spec.task_definition_family.clone(),
            overrides: self.spec.overrides.clone(),
            started_by: self.spec.started_by.clone(),
        };
        let task_id = self.repository.launch_task(&request).await?;

        info!(
            "Job {}: launched task {} ({})",
            self.state.name(),
            task_id,
            self.report_description()
        );
        self.task_id = Some(task_id);
        Ok(RunOutcome::Pending)
    }

    async fn poll(&mut self) -> bool {
        if self.state.is_finished() {
            return true;
        }
        let Some(task_id) = self.task_id.clone() else {
            return false;
        };

        let task = match self.repository.describe_task(&task_id).await {
            Ok(task) => task,
            Err(e) => {
                warn!(
                    "Job {}: failed to describe task {}: {:#}",
                    self.state.name(),
                    task_id,
                    e
                );
                return false;
            }
        };

        if !task.is_stopped() {
            debug!(
                "Job {}: task {} is {}",
                self.state.name(),
                task_id,
                task.last_status
            );
            return false;
        }

        let (exit_code, output) = self.collect_results(&task_id, &task).await;
        info!(
            "Job {}: task {} stopped with exit code {}",
            self.state.name(),
            task_id,
            exit_code
        );
        self.stopped_reason = task.stopped_reason;
        self.state.mark_finished(exit_code, output);
        true
    }

    fn report_description(&self) -> String {
        format!("{}/{}", self.spec.cluster, self.spec.task_definition_family)
    }

    fn error_repr(&self) -> String {
        self.state.error_repr(&[
            ("Cluster", self.spec.cluster.clone()),
            ("Task Definition Family", self.spec.task_definition_family.clone()),
            (
                "Task ID",
                self.task_id.clone().unwrap_or_else(|| "None".to_string()),
            ),
            (
                "Stopped Reason",
                self.stopped_reason
                    .clone()
                    .unwrap_or_else(|| "None".to_string()),
            ),
        ])
    }
}
