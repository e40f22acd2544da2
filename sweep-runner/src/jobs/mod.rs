//! Job variants
//!
//! One type per way of executing work, all implementing
//! `sweep_core::Job`:
//! - `LocalCommand`: a subprocess on this host
//! - `RemoteTask`: a task launched through the remote task service
//! - `DockerExec`: a command exec'd into a container addressed by name
//! - `EcsDockerExec`: a command exec'd into the container of a task family

mod container_exec;
mod docker_exec;
mod ecs_docker_exec;
mod local_command;
mod remote_task;

pub use container_exec::{
    ContainerExecSpec, ContainerTarget, ECS_CONTAINER_NAME_LABEL, ECS_FAMILY_LABEL,
    exec_in_container, find_task_container,
};
pub use docker_exec::{DockerExec, DockerExecSpec};
pub use ecs_docker_exec::{EcsDockerExec, EcsDockerExecSpec};
pub use local_command::{LocalCommand, LocalCommandSpec};
pub use remote_task::{RemoteTask, RemoteTaskSpec};

use serde::{Deserialize, Serialize};

/// A command given either as one string or as an argument vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    Line(String),
    Argv(Vec<String>),
}

impl CommandSpec {
    /// Splits the command into program and arguments
    ///
    /// A single string is split with POSIX shell quoting rules, so
    /// `sh -c 'a | b'` yields three arguments.
    pub fn to_argv(&self) -> anyhow::Result<Vec<String>> {
        match self {
            CommandSpec::Line(line) => shlex::split(line)
                .ok_or_else(|| anyhow::anyhow!("unbalanced quoting in command: {}", line)),
            CommandSpec::Argv(argv) => Ok(argv.clone()),
        }
    }

    /// The command as one line, for running through a shell
    pub fn to_line(&self) -> String {
        match self {
            CommandSpec::Line(line) => line.clone(),
            CommandSpec::Argv(argv) => argv.join(" "),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CommandSpec::Line(line) => line.trim().is_empty(),
            CommandSpec::Argv(argv) => argv.is_empty() || argv[0].trim().is_empty(),
        }
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandSpec::Line(line) => write!(f, "{}", line),
            CommandSpec::Argv(argv) => write!(f, "{:?}", argv),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_from_yaml() {
        let line: CommandSpec = serde_yaml::from_str("echo hello world").unwrap();
        assert_eq!(line, CommandSpec::Line("echo hello world".to_string()));
        assert_eq!(line.to_argv().unwrap(), vec!["echo", "hello", "world"]);

        let argv: CommandSpec = serde_yaml::from_str("[ls, -l, /tmp dir]").unwrap();
        assert_eq!(argv.to_argv().unwrap(), vec!["ls", "-l", "/tmp dir"]);
        assert_eq!(argv.to_line(), "ls -l /tmp dir");
        assert_eq!(argv.to_string(), r#"["ls", "-l", "/tmp dir"]"#);
    }

    #[test]
    fn test_quoted_line_keeps_arguments_together() {
        let line = CommandSpec::Line("sh -c 'pg_dump app | gzip > /b.gz'".to_string());
        assert_eq!(
            line.to_argv().unwrap(),
            vec!["sh", "-c", "pg_dump app | gzip > /b.gz"]
        );

        let line = CommandSpec::Line(r#"echo "two words" three\ four"#.to_string());
        assert_eq!(line.to_argv().unwrap(), vec!["echo", "two words", "three four"]);
    }

    #[test]
    fn test_unbalanced_quotes_are_rejected() {
        let line = CommandSpec::Line("sh -c 'echo unterminated".to_string());
        let err = line.to_argv().unwrap_err();
        assert!(err.to_string().contains("unbalanced quoting"));
    }

    #[test]
    fn test_empty_commands() {
        assert!(CommandSpec::Line("  ".to_string()).is_empty());
        assert!(CommandSpec::Argv(vec![]).is_empty());
        assert!(!CommandSpec::Line("true".to_string()).is_empty());
    }
}
