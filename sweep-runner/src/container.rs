//! Container runtime access
//!
//! Container exec jobs talk to the local container engine through the
//! `ContainerRuntime` trait. The standard implementation drives the `docker`
//! (or `podman`) command line:
//! - Checking the engine is reachable
//! - Listing running containers with their labels
//! - Inspecting a single container by name or id
//! - Executing a command inside a container and capturing its output

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::process::{CaptureOptions, run_captured};

/// Errors raised by the container runtime adapter
#[derive(Debug, Error)]
pub enum ContainerError {
    /// The runtime binary could not be executed
    #[error("failed to execute '{binary} {action}': {source}")]
    Spawn {
        binary: String,
        action: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The runtime ran but reported a failure
    #[error("'{binary} {action}' exited {exit_code}: {output}")]
    CommandFailed {
        binary: String,
        action: &'static str,
        exit_code: i32,
        output: String,
    },

    /// The runtime's JSON output could not be parsed
    #[error("failed to parse '{action}' output: {source}")]
    Parse {
        action: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// No container with the given name or id exists
    #[error("no such container: {0}")]
    NotFound(String),
}

/// What the runtime reports about one container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub status: String,
    pub labels: HashMap<String, String>,
}

impl ContainerInfo {
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }

    /// First 12 characters of the id, as the docker CLI shows it
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(12)
            .map(|(idx, _)| idx)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }
}

/// Options for a command executed in a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOptions {
    pub tty: bool,
    pub stdout: bool,
    pub stderr: bool,
    pub privileged: bool,
    pub user: String,
    pub environment: BTreeMap<String, String>,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            tty: false,
            stdout: true,
            stderr: true,
            privileged: false,
            user: "root".to_string(),
            environment: BTreeMap::new(),
        }
    }
}

/// Output and exit code of a command executed in a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    pub output: String,
    pub exit_code: i32,
}

/// Access to the local container engine
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Checks that the engine is reachable
    async fn ping(&self) -> Result<(), ContainerError>;

    /// Lists running containers in the engine's enumeration order
    async fn list_running(&self) -> Result<Vec<ContainerInfo>, ContainerError>;

    /// Looks up one container by name or id
    async fn inspect(&self, name_or_id: &str) -> Result<ContainerInfo, ContainerError>;

    /// Executes `command` inside `container`
    async fn exec(
        &self,
        container: &str,
        command: &[String],
        options: &ExecOptions,
    ) -> Result<ExecResult, ContainerError>;
}

/// Container runtime backed by the `docker`/`podman` CLI
#[derive(Debug, Clone)]
pub struct CliContainerRuntime {
    binary: String,
}

impl CliContainerRuntime {
    /// Creates a runtime that invokes `binary` (e.g. "docker" or "podman")
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Runs the runtime binary and returns its stdout, failing on non-zero exit
    ///
    /// STDERR is kept apart from STDOUT so it can explain a failure without
    /// ending up in parsed output.
    async fn invoke(&self, action: &'static str, args: &[&str]) -> Result<String, ContainerError> {
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|source| ContainerError::Spawn {
                binary: self.binary.clone(),
                action,
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!("{} {} stderr: {}", self.binary, action, stderr.trim());
        }

        if output.status.success() {
            return Ok(stdout);
        }
        let reason = if stderr.trim().is_empty() {
            stdout.trim()
        } else {
            stderr.trim()
        };
        Err(ContainerError::CommandFailed {
            binary: self.binary.clone(),
            action,
            exit_code: output.status.code().unwrap_or(-1),
            output: reason.to_string(),
        })
    }

    async fn inspect_many(&self, ids: &[&str]) -> Result<Vec<ContainerInfo>, ContainerError> {
        let mut args = vec!["inspect", "--type", "container"];
        args.extend_from_slice(ids);
        let json = self.invoke("inspect", &args).await?;
        parse_inspect(&json)
    }
}

#[async_trait]
impl ContainerRuntime for CliContainerRuntime {
    async fn ping(&self) -> Result<(), ContainerError> {
        debug!("Checking {} is available", self.binary);
        let version = self.invoke("version", &["version"]).await?;
        debug!(
            "{} is available: {}",
            self.binary,
            version.lines().next().unwrap_or_default().trim()
        );
        Ok(())
    }

    async fn list_running(&self) -> Result<Vec<ContainerInfo>, ContainerError> {
        let ids = self.invoke("ps", &["ps", "-q", "--no-trunc"]).await?;
        let ids: Vec<&str> = ids
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        debug!("{} reports {} running container(s)", self.binary, ids.len());

        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.inspect_many(&ids).await
    }

    async fn inspect(&self, name_or_id: &str) -> Result<ContainerInfo, ContainerError> {
        match self.inspect_many(&[name_or_id]).await {
            Ok(mut found) if !found.is_empty() => Ok(found.remove(0)),
            Ok(_) => Err(ContainerError::NotFound(name_or_id.to_string())),
            Err(ContainerError::CommandFailed { .. }) => {
                Err(ContainerError::NotFound(name_or_id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn exec(
        &self,
        container: &str,
        command: &[String],
        options: &ExecOptions,
    ) -> Result<ExecResult, ContainerError> {
        let args = exec_args(container, command, options);
        info!("Executing {:?} in container {}", command, container);

        let capture = CaptureOptions {
            stdout: options.stdout,
            stderr: options.stderr,
            timeout: None,
        };
        let mut cmd = Command::new(&self.binary);
        cmd.args(&args);
        let captured = run_captured(cmd, capture)
            .await
            .map_err(|source| ContainerError::Spawn {
                binary: self.binary.clone(),
                action: "exec",
                source,
            })?;

        let exit_code = captured.exit_code().unwrap_or(1);
        debug!(
            "Exec in container {} exited {} ({} bytes of output)",
            container,
            exit_code,
            captured.output.len()
        );

        Ok(ExecResult {
            output: captured.output.trim().to_string(),
            exit_code,
        })
    }
}

/// Builds the argument list for `<runtime> exec`
fn exec_args(container: &str, command: &[String], options: &ExecOptions) -> Vec<String> {
    let mut args = vec!["exec".to_string()];
    if options.tty {
        args.push("-t".to_string());
    }
    if options.privileged {
        args.push("--privileged".to_string());
    }
    args.push("-u".to_string());
    args.push(options.user.clone());
    for (key, value) in &options.environment {
        args.push("-e".to_string());
        args.push(format!("{}={}", key, value));
    }
    args.push(container.to_string());
    args.extend(command.iter().cloned());
    args
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEntry {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    state: Option<InspectState>,
    #[serde(default)]
    config: Option<InspectConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    #[serde(default)]
    labels: Option<HashMap<String, String>>,
}

/// Parses `inspect` output (a JSON array) into container descriptions
fn parse_inspect(json: &str) -> Result<Vec<ContainerInfo>, ContainerError> {
    let entries: Vec<InspectEntry> =
        serde_json::from_str(json).map_err(|source| ContainerError::Parse {
            action: "inspect",
            source,
        })?;

    Ok(entries
        .into_iter()
        .map(|entry| ContainerInfo {
            id: entry.id,
            name: entry.name.trim_start_matches('/').to_string(),
            status: entry.state.map(|s| s.status).unwrap_or_default(),
            labels: entry.config.and_then(|c| c.labels).unwrap_or_default(),
        })
        .collect())
}
