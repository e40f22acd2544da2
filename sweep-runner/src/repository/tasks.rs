//! Tasks repository
//!
//! Handles communication with the remote task service for `RemoteTask` jobs:
//! - Launching tasks
//! - Describing task status
//! - Fetching per-container log text

use anyhow::{Context, Result};
use async_trait::async_trait;
use sweep_client::TaskApiClient;
use sweep_core::dto::task::{LaunchTaskRequest, TaskDescription};

/// Repository trait for remote task operations
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Launches a task and returns its identifier
    async fn launch_task(&self, request: &LaunchTaskRequest) -> Result<String>;

    /// Describes the current status of a task
    async fn describe_task(&self, task_id: &str) -> Result<TaskDescription>;

    /// Fetches the log text written by one container of a task
    async fn fetch_container_logs(&self, task_id: &str, container: &str) -> Result<String>;
}

/// HTTP implementation of TaskRepository
pub struct HttpTaskRepository {
    client: TaskApiClient,
}

impl HttpTaskRepository {
    /// Creates a new HTTP task repository
    ///
    /// # Arguments
    /// * `client` - Client pointed at the task service
    pub fn new(client: TaskApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TaskRepository for HttpTaskRepository {
    async fn launch_task(&self, request: &LaunchTaskRequest) -> Result<String> {
        let response = self.client.launch_task(request).await.with_context(|| {
            format!(
                "Failed to launch task from family {}",
                request.task_definition_family
            )
        })?;

        Ok(response.task_id)
    }

    async fn describe_task(&self, task_id: &str) -> Result<TaskDescription> {
        self.client
            .describe_task(task_id)
            .await
            .with_context(|| format!("Failed to describe task {}", task_id))
    }

    async fn fetch_container_logs(&self, task_id: &str, container: &str) -> Result<String> {
        self.client
            .fetch_container_logs(task_id, container)
            .await
            .with_context(|| {
                format!(
                    "Failed to fetch logs of container {} in task {}",
                    container, task_id
                )
            })
    }
}
