//! Task API endpoints

use crate::TaskApiClient;
use crate::error::Result;
use sweep_core::dto::task::{LaunchTaskRequest, LaunchTaskResponse, TaskDescription};
use tracing::debug;

impl TaskApiClient {
    /// Launch a task from a task definition family
    ///
    /// # Returns
    /// The identifier of the launched task
    pub async fn launch_task(&self, req: &LaunchTaskRequest) -> Result<LaunchTaskResponse> {
        let url = self.endpoint(&["api", "tasks"])?;
        debug!(
            "Launching task family={} cluster={}",
            req.task_definition_family, req.cluster
        );
        let response = self.client.post(url).json(req).send().await?;

        self.handle_response(response).await
    }

    /// Get the current status of a task
    pub async fn describe_task(&self, task_id: &str) -> Result<TaskDescription> {
        let url = self.endpoint(&["api", "tasks", task_id])?;
        let response = self.client.get(url).send().await?;

        self.handle_response(response).await
    }

    /// Fetch the log text written by one container of a task
    pub async fn fetch_container_logs(&self, task_id: &str, container: &str) -> Result<String> {
        let url = self.endpoint(&["api", "tasks", task_id, "containers", container, "logs"])?;
        let response = self.client.get(url).send().await?;

        self.handle_text_response(response).await
    }
}
