//! Remote task DTOs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Task status reported once every container of a task has exited
pub const TASK_STATUS_STOPPED: &str = "STOPPED";

/// Request to launch a task from a task definition family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchTaskRequest {
    pub cluster: String,
    pub task_definition_family: String,
    #[serde(default)]
    pub overrides: Vec<ContainerOverride>,
    pub started_by: Option<String>,
}

/// Per-container command and environment overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerOverride {
    pub name: String,
    #[serde(default)]
    pub command: Option<Vec<String>>,
    #[serde(default)]
    pub environment: HashMap<String, String>,
}

/// Response to a launch request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchTaskResponse {
    pub task_id: String,
}

/// Current view of a launched task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescription {
    pub task_id: String,
    pub last_status: String,
    #[serde(default)]
    pub stopped_reason: Option<String>,
    #[serde(default)]
    pub containers: Vec<TaskContainer>,
}

impl TaskDescription {
    /// Whether the task has reached its terminal state
    pub fn is_stopped(&self) -> bool {
        self.last_status.eq_ignore_ascii_case(TASK_STATUS_STOPPED)
    }
}

/// One container (process) within a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskContainer {
    pub name: String,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub reason: Option<String>,
}
