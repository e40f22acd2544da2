//! ECS docker exec job
//!
//! Runs a command in the container of a running ECS task on this host. The
//! container is found through the labels the ECS agent sets on it: the task
//! definition family and the container name within that family. When more
//! than one running container matches, the first one listed is used.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use sweep_core::Job;
use sweep_core::domain::job::{JobState, RunOutcome};

use super::container_exec::{ContainerExecSpec, ContainerTarget, exec_in_container};
use crate::container::{ContainerInfo, ContainerRuntime};

/// Configuration of an ECS docker exec job
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EcsDockerExecSpec {
    pub task_definition_family: String,
    pub container_name: String,
    #[serde(flatten)]
    pub exec: ContainerExecSpec,
}

pub struct EcsDockerExec {
    state: JobState,
    spec: EcsDockerExecSpec,
    runtime: Arc<dyn ContainerRuntime>,
    container: Option<ContainerInfo>,
}

impl EcsDockerExec {
    pub fn new(state: JobState, spec: EcsDockerExecSpec, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            state,
            spec,
            runtime,
            container: None,
        }
    }

    /// The container the command ran in, once found
    pub fn container(&self) -> Option<&ContainerInfo> {
        self.container.as_ref()
    }
}

#[async_trait]
impl Job for EcsDockerExec {
    fn state(&self) -> &JobState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut JobState {
        &mut self.state
    }

    async fn run(&mut self) -> anyhow::Result<RunOutcome> {
        self.state.mark_started();
        let target = ContainerTarget::EcsTask {
            family: self.spec.task_definition_family.clone(),
            container_name: self.spec.container_name.clone(),
        };
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
        format!(
            "{}/{}: {}",
            self.spec.task_definition_family, self.spec.container_name, self.spec.exec.command
        )
    }

    fn error_repr(&self) -> String {
        let mut details = vec![
            ("Task Family", self.spec.task_definition_family.clone()),
            ("Task Container Name", self.spec.container_name.clone()),
        ];
        details.extend(self.spec.exec.repr_details(self.container.as_ref()));
        self.state.error_repr(&details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::CommandSpec;
    use crate::test_utils::{FakeRuntime, container};
    use sweep_core::domain::job::EXIT_CODE_SETUP_FAILURE;

    fn job(runtime: Arc<FakeRuntime>) -> EcsDockerExec {
        let mut exec = ContainerExecSpec::new(CommandSpec::Line("./manage.py clearsessions".to_string()));
        exec.environment.insert("DJANGO_ENV".to_string(), "prod".to_string());
        EcsDockerExec::new(
            JobState::new("sessions", "hourly"),
            EcsDockerExecSpec {
                task_definition_family: "web".to_string(),
                container_name: "app".to_string(),
                exec,
            },
            runtime,
        )
    }

    #[tokio::test]
    async fn test_runs_in_first_matching_container() {
        let runtime = Arc::new(
            FakeRuntime::new(vec![
                container("aaa", "ecs-db-1", "db", "app", "running"),
                container("bbb", "ecs-web-1-app", "web", "app", "running"),
                container("ccc", "ecs-web-2-app", "web", "app", "running"),
            ])
            .with_exec_result("Cleared 10 sessions", 0),
        );
        let mut job = job(runtime.clone());

        assert_eq!(job.run().await.unwrap(), RunOutcome::Succeeded);
        assert_eq!(job.container().map(|c| c.name.as_str()), Some("ecs-web-1-app"));

        let execs = runtime.execs();
        assert_eq!(execs.len(), 1);
        assert_eq!(execs[0].0, "bbb");
        assert_eq!(execs[0].1, vec!["./manage.py", "clearsessions"]);
        assert_eq!(
            execs[0].2.environment.get("DJANGO_ENV").map(String::as_str),
            Some("prod")
        );
        assert_eq!(job.summary(), "Cleared 10 sessions");
    }

    #[tokio::test]
    async fn test_no_running_container_is_error() {
        let runtime = Arc::new(FakeRuntime::new(vec![container(
            "bbb",
            "ecs-web-1-app",
            "web",
            "app",
            "exited",
        )]));
        let mut job = job(runtime.clone());

        let err = job.run().await.unwrap_err();
        assert!(err.to_string().contains("family=web container_name=app"));
        assert_eq!(job.state().exit_code(), Some(EXIT_CODE_SETUP_FAILURE));
        assert!(runtime.execs().is_empty());
    }

    #[test]
    fn test_descriptions() {
        let job = job(Arc::new(FakeRuntime::new(vec![])));
        assert_eq!(job.report_description(), "web/app: ./manage.py clearsessions");
        let repr = job.error_repr();
        assert!(repr.contains("Task Family: web\nTask Container Name: app\nTTY: false\n"));
        assert!(repr.contains("Output: None\n"));
    }
}
