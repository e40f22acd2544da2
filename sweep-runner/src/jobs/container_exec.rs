//! Shared exec path for container jobs
//!
//! `DockerExec` and `EcsDockerExec` only differ in how they find the
//! container. Everything after that (connecting to the runtime, running the
//! command, recording output and exit code) lives here.

use anyhow::{Context, anyhow};
use serde::Deserialize;
use std::collections::BTreeMap;
use sweep_core::domain::job::{JobState, RunOutcome};
use tracing::{debug, info};

use super::CommandSpec;
use crate::container::{ContainerInfo, ContainerRuntime, ExecOptions};

/// Label the ECS agent sets to the task definition family
pub const ECS_FAMILY_LABEL: &str = "com.amazonaws.ecs.task-definition-family";

/// Label the ECS agent sets to the container name within the task definition
pub const ECS_CONTAINER_NAME_LABEL: &str = "com.amazonaws.ecs.container-name";

/// How a container job finds the container to exec into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerTarget {
    /// A container addressed by name or id
    Named(String),
    /// The first running container of an ECS task family
    EcsTask {
        family: String,
        container_name: String,
    },
}

impl std::fmt::Display for ContainerTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerTarget::Named(name) => write!(f, "{}", name),
            ContainerTarget::EcsTask {
                family,
                container_name,
            } => write!(f, "{}/{}", family, container_name),
        }
    }
}

/// Command and exec options shared by container jobs
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContainerExecSpec {
    pub command: CommandSpec,
    #[serde(default)]
    pub tty: bool,
    #[serde(default = "default_true")]
    pub stdout: bool,
    #[serde(default = "default_true")]
    pub stderr: bool,
    #[serde(default)]
    pub privileged: bool,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

fn default_user() -> String {
    "root".to_string()
}

impl ContainerExecSpec {
    pub fn new(command: CommandSpec) -> Self {
        let defaults = ExecOptions::default();
        Self {
            command,
            tty: defaults.tty,
            stdout: defaults.stdout,
            stderr: defaults.stderr,
            privileged: defaults.privileged,
            user: defaults.user,
            environment: defaults.environment,
        }
    }

    pub fn exec_options(&self) -> ExecOptions {
        ExecOptions {
            tty: self.tty,
            stdout: self.stdout,
            stderr: self.stderr,
            privileged: self.privileged,
            user: self.user.clone(),
            environment: self.environment.clone(),
        }
    }

    /// Variant-independent lines for `error_repr`
    pub(crate) fn repr_details(&self, container: Option<&ContainerInfo>) -> Vec<(&'static str, String)> {
        let mut details = Vec::new();
        if let Some(container) = container {
            details.push(("Container ID", container.short_id().to_string()));
        }
        details.push(("TTY", self.tty.to_string()));
        details.push(("Privileged", self.privileged.to_string()));
        details.push(("Environment", format!("{:?}", self.environment)));
        details
    }
}

/// Returns the first running container whose ECS labels match
pub fn find_task_container<'a>(
    containers: &'a [ContainerInfo],
    family: &str,
    container_name: &str,
) -> Option<&'a ContainerInfo> {
    containers.iter().find(|c| {
        if !c.is_running() {
            debug!("Skipping container {} (not running)", c.name);
            return false;
        }
        let name_matches = c.labels.get(ECS_CONTAINER_NAME_LABEL).map(String::as_str) == Some(container_name);
        let family_matches = c.labels.get(ECS_FAMILY_LABEL).map(String::as_str) == Some(family);
        if !name_matches || !family_matches {
            debug!("Skipping container {} (labels do not match)", c.name);
        }
        name_matches && family_matches
    })
}

async fn resolve(runtime: &dyn ContainerRuntime, target: &ContainerTarget) -> anyhow::Result<ContainerInfo> {
    match target {
        ContainerTarget::Named(name) => {
            debug!("Getting container {}", name);
            runtime
                .inspect(name)
                .await
                .with_context(|| format!("Could not get container {}", name))
        }
        ContainerTarget::EcsTask {
            family,
            container_name,
        } => {
            let containers = runtime
                .list_running()
                .await
                .context("Could not list running containers")?;
            let found = find_task_container(&containers, family, container_name).ok_or_else(|| {
                anyhow!(
                    "Could not find running container for task family={} container_name={}",
                    family,
                    container_name
                )
            })?;
            info!(
                "Found container for {}/{}: {} ({})",
                family,
                container_name,
                found.name,
                found.short_id()
            );
            Ok(found.clone())
        }
    }
}

/// Runs `spec.command` in the container `target` resolves to
///
/// The job must already be marked started. On success the state is finished
/// with the command's exit code and output. Any failure to reach the
/// runtime, find the container or start the exec finishes the state with the
/// setup-failure sentinel and is returned as an error. The resolved
/// container is stored in `container` as soon as it is known.
pub async fn exec_in_container(
    state: &mut JobState,
    runtime: &dyn ContainerRuntime,
    target: &ContainerTarget,
    spec: &ContainerExecSpec,
    container: &mut Option<ContainerInfo>,
) -> anyhow::Result<RunOutcome> {
    let attempt = async {
        let argv = spec.command.to_argv()?;
        debug!("Connecting to container runtime...");
        runtime
            .ping()
            .await
            .context("Container runtime is not available")?;

        let found = resolve(runtime, target).await?;
        debug!("Got container {}", found.short_id());
        *container = Some(found.clone());

        info!(
            "Executing \"{}\" against container {} ({})",
            spec.command,
            found.name,
            found.short_id()
        );
        runtime
            .exec(&found.id, &argv, &spec.exec_options())
            .await
            .with_context(|| format!("Exec in container {} failed", found.name))
    };

    match attempt.await {
        Ok(result) => {
            debug!("Exec finished; exited {}", result.exit_code);
            state.mark_finished(result.exit_code, result.output);
            Ok(RunOutcome::from_exit_code(result.exit_code))
        }
        Err(e) => {
            state.fail_setup(format!("{:#}", e));
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeRuntime, container};
    use sweep_core::domain::job::EXIT_CODE_SETUP_FAILURE;

    fn spec() -> ContainerExecSpec {
        ContainerExecSpec::new(CommandSpec::Line("pg_dump app".to_string()))
    }

    #[test]
    fn test_find_task_container_first_running_match() {
        let containers = vec![
            container("c1", "first", "backup", "app", "running"),
            container("c2", "stopped", "backup", "app", "exited"),
            container("c3", "wanted", "backup", "app", "running"),
            container("c4", "later", "backup", "app", "running"),
        ];
        let found = find_task_container(&containers, "backup", "app").unwrap();
        assert_eq!(found.name, "first");

        let found = find_task_container(&containers[1..], "backup", "app").unwrap();
        assert_eq!(found.name, "wanted");

        assert!(find_task_container(&containers, "backup", "db").is_none());
        assert!(find_task_container(&containers, "web", "app").is_none());
    }

    #[test]
    fn test_spec_defaults_from_yaml() {
        let spec: ContainerExecSpec = serde_yaml::from_str("command: [ls, -l]").unwrap();
        assert_eq!(spec, ContainerExecSpec::new(CommandSpec::Argv(vec!["ls".into(), "-l".into()])));
        assert_eq!(spec.user, "root");
        assert!(spec.stdout && spec.stderr);
    }

    #[tokio::test]
    async fn test_exec_by_name() {
        let runtime = FakeRuntime::new(vec![container("abc", "db", "fam", "db", "running")])
            .with_exec_result("dumped\n", 0);
        let mut state = JobState::new("job", "daily");
        state.mark_started();
        let mut found = None;

        let outcome = exec_in_container(
            &mut state,
            &runtime,
            &ContainerTarget::Named("db".to_string()),
            &spec(),
            &mut found,
        )
        .await
        .unwrap();

        assert_eq!(outcome, RunOutcome::Succeeded);
        assert_eq!(state.exit_code(), Some(0));
        assert_eq!(state.output(), Some("dumped\n"));
        assert_eq!(found.unwrap().name, "db");

        let execs = runtime.execs();
        assert_eq!(execs.len(), 1);
        assert_eq!(execs[0].0, "abc");
        assert_eq!(execs[0].1, vec!["pg_dump", "app"]);
    }

    #[tokio::test]
    async fn test_missing_ecs_container_is_error() {
        let runtime = FakeRuntime::new(vec![container("abc", "db", "fam", "db", "running")]);
        let mut state = JobState::new("job", "daily");
        state.mark_started();
        let mut found = None;

        let err = exec_in_container(
            &mut state,
            &runtime,
            &ContainerTarget::EcsTask {
                family: "fam".to_string(),
                container_name: "web".to_string(),
            },
            &spec(),
            &mut found,
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("Could not find running container"));
        assert!(found.is_none());
        assert!(state.is_finished());
        assert_eq!(state.exit_code(), Some(EXIT_CODE_SETUP_FAILURE));
        assert!(runtime.execs().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_runtime_is_error() {
        let runtime = FakeRuntime::new(vec![]).unreachable();
        let mut state = JobState::new("job", "daily");
        state.mark_started();

        let result = exec_in_container(
            &mut state,
            &runtime,
            &ContainerTarget::Named("db".to_string()),
            &spec(),
            &mut None,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(state.exit_code(), Some(EXIT_CODE_SETUP_FAILURE));
    }

    #[tokio::test]
    async fn test_quoted_command_keeps_shell_script_together() {
        let runtime = FakeRuntime::new(vec![container("abc", "db", "fam", "db", "running")]);
        let mut state = JobState::new("job", "daily");
        state.mark_started();
        let spec: ContainerExecSpec =
            serde_yaml::from_str("command: sh -c 'pg_dump app | gzip > /b.gz'").unwrap();

        exec_in_container(
            &mut state,
            &runtime,
            &ContainerTarget::Named("db".to_string()),
            &spec,
            &mut None,
        )
        .await
        .unwrap();

        assert_eq!(
            runtime.execs()[0].1,
            vec!["sh", "-c", "pg_dump app | gzip > /b.gz"]
        );
    }

    #[tokio::test]
    async fn test_unbalanced_quotes_fail_before_exec() {
        let runtime = FakeRuntime::new(vec![container("abc", "db", "fam", "db", "running")]);
        let mut state = JobState::new("job", "daily");
        state.mark_started();
        let spec = ContainerExecSpec::new(CommandSpec::Line("sh -c 'echo hi".to_string()));

        let err = exec_in_container(
            &mut state,
            &runtime,
            &ContainerTarget::Named("db".to_string()),
            &spec,
            &mut None,
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("unbalanced quoting"));
        assert_eq!(state.exit_code(), Some(EXIT_CODE_SETUP_FAILURE));
        assert!(runtime.execs().is_empty());
    }
}
