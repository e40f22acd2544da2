//! Fakes shared by unit tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::container::{ContainerError, ContainerInfo, ContainerRuntime, ExecOptions, ExecResult};
use crate::jobs::{ECS_CONTAINER_NAME_LABEL, ECS_FAMILY_LABEL};

/// Builds a container carrying the ECS task labels
pub fn container(id: &str, name: &str, family: &str, container_name: &str, status: &str) -> ContainerInfo {
    let mut labels = HashMap::new();
    labels.insert(ECS_FAMILY_LABEL.to_string(), family.to_string());
    labels.insert(ECS_CONTAINER_NAME_LABEL.to_string(), container_name.to_string());
    ContainerInfo {
        id: id.to_string(),
        name: name.to_string(),
        status: status.to_string(),
        labels,
    }
}

/// In-memory container runtime that records every exec
pub struct FakeRuntime {
    containers: Vec<ContainerInfo>,
    reachable: bool,
    exec_result: ExecResult,
    execs: Mutex<Vec<(String, Vec<String>, ExecOptions)>>,
}

impl FakeRuntime {
    pub fn new(containers: Vec<ContainerInfo>) -> Self {
        Self {
            containers,
            reachable: true,
            exec_result: ExecResult {
                output: String::new(),
                exit_code: 0,
            },
            execs: Mutex::new(Vec::new()),
        }
    }

    pub fn with_exec_result(mut self, output: &str, exit_code: i32) -> Self {
        self.exec_result = ExecResult {
            output: output.to_string(),
            exit_code,
        };
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    /// `(container id, command, options)` of every exec so far
    pub fn execs(&self) -> Vec<(String, Vec<String>, ExecOptions)> {
        self.execs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn ping(&self) -> Result<(), ContainerError> {
        if self.reachable {
            Ok(())
        } else {
            Err(ContainerError::Spawn {
                binary: "fake".to_string(),
                action: "version",
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not installed"),
            })
        }
    }

    async fn list_running(&self) -> Result<Vec<ContainerInfo>, ContainerError> {
        Ok(self.containers.iter().filter(|c| c.is_running()).cloned().collect())
    }

    async fn inspect(&self, name_or_id: &str) -> Result<ContainerInfo, ContainerError> {
        self.containers
            .iter()
            .find(|c| c.name == name_or_id || c.id == name_or_id)
            .cloned()
            .ok_or_else(|| ContainerError::NotFound(name_or_id.to_string()))
    }

    async fn exec(
        &self,
        container: &str,
        command: &[String],
        options: &ExecOptions,
    ) -> Result<ExecResult, ContainerError> {
        self.execs
            .lock()
            .unwrap()
            .push((container.to_string(), command.to_vec(), options.clone()));
        Ok(self.exec_result.clone())
    }
}
