//! Docker exec job
//!
//! Runs a command in an existing container addressed by name (or id).

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use sweep_core::Job;
use sweep_core::domain::job::{JobState, RunOutcome};

use super::container_exec::{ContainerExecSpec, ContainerTarget, exec_in_container};
use crate::container::{ContainerInfo, ContainerRuntime};

/// Configuration of a docker exec job
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DockerExecSpec {
    pub container_name: String,
    #[serde(flatten)]
    pub exec: ContainerExecSpec,
}

pub struct DockerExec {
    state: JobState,
    spec: DockerExecSpec,
    runtime: Arc<dyn ContainerRuntime>,
    container: Option<ContainerInfo>,
}

impl DockerExec {
    pub fn new(state: JobState, spec: DockerExecSpec, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            state,
            spec,
            runtime,
            container: None,
        }
    }
}

#[async_trait]
impl Job for DockerExec {
    fn state(&self) -> &JobState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut JobState {
        &mut self.state
    }

    async fn run(&mut self) -> anyhow::Result<RunOutcome> {
        self.state.mark_started();
        let target = ContainerTarget::Named(self.spec.container_name.clone());
        exec_in_container(
            &mut self.state,
            self.runtime.as_ref(),
            &target,
            &self.spec.exec,
            &mut self.container,
        )
        .await
    }

    fn report_description(&self) -> String {
        format!("{}: {}", self.spec.container_name, self.spec.exec.command)
    }

    fn error_repr(&self) -> String {
        let mut details = vec![("Container Name", self.spec.container_name.clone())];
        details.extend(self.spec.exec.repr_details(self.container.as_ref()));
        self.state.error_repr(&details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::CommandSpec;
    use crate::test_utils::{FakeRuntime, container};

    fn job(runtime: Arc<FakeRuntime>) -> DockerExec {
        DockerExec::new(
            JobState::new("dump", "nightly"),
            DockerExecSpec {
                container_name: "db".to_string(),
                exec: ContainerExecSpec::new(CommandSpec::Argv(vec![
                    "pg_dump".to_string(),
                    "app".to_string(),
                ])),
            },
            runtime,
        )
    }

    #[tokio::test]
    async fn test_run_nonzero_exit() {
        let runtime = Arc::new(
            FakeRuntime::new(vec![container("0123456789abcdef", "db", "f", "db", "running")])
                .with_exec_result("pg_dump: error", 1),
        );
        let mut job = job(runtime.clone());

        assert_eq!(job.run().await.unwrap(), RunOutcome::Failed);
        assert_eq!(job.state().exit_code(), Some(1));
        assert_eq!(job.summary(), "pg_dump: error");
        assert_eq!(runtime.execs()[0].2.user, "root");

        let repr = job.error_repr();
        assert!(repr.contains("Exit Code: 1\nContainer Name: db\nContainer ID: 0123456789ab\n"));
        assert!(repr.contains("TTY: false\nPrivileged: false\n"));
    }

    #[tokio::test]
    async fn test_missing_container_is_error() {
        let runtime = Arc::new(FakeRuntime::new(vec![]));
        let mut job = job(runtime);

        assert!(job.run().await.is_err());
        assert!(job.state().is_finished());
        assert!(!job.error_repr().contains("Container ID"));
    }

    #[test]
    fn test_spec_from_yaml() {
        let yaml = "container_name: db\ncommand: pg_dump app\nuser: postgres\ntty: true\n";
        let spec: DockerExecSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.container_name, "db");
        assert_eq!(spec.exec.user, "postgres");
        assert!(spec.exec.tty);
        assert!(spec.exec.stdout);

        let job = DockerExec::new(
            JobState::new("dump", "nightly"),
            spec,
            Arc::new(FakeRuntime::new(vec![])),
        );
        assert_eq!(job.report_description(), "db: pg_dump app");
    }
}
