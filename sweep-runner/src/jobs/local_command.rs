//! Local command job
//!
//! Runs a subprocess on this host synchronously, capturing combined
//! STDOUT and STDERR. The command is either given statically or downloaded
//! as an executable script from an HTTP(S) URL before running.

use anyhow::{Context, bail};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use sweep_core::Job;
use sweep_core::domain::job::{EXIT_CODE_TIMEOUT, JobState, RunOutcome};
use tempfile::TempPath;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::CommandSpec;
use crate::process::{CaptureOptions, run_captured};

/// Configuration of a local command job
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LocalCommandSpec {
    /// Static command; ignored when `script_source` is set
    #[serde(default)]
    pub command: Option<CommandSpec>,
    /// Run `command` through `/bin/sh -c`
    #[serde(default)]
    pub shell: bool,
    /// Wall-clock limit in seconds
    #[serde(default)]
    pub timeout: Option<u64>,
    /// HTTP(S) URL of an executable script to download and run
    #[serde(default)]
    pub script_source: Option<String>,
    #[serde(default)]
    pub script_args: Vec<String>,
    /// Extra environment variables for the child
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

impl LocalCommandSpec {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}

/// A job that runs a local subprocess
pub struct LocalCommand {
    state: JobState,
    spec: LocalCommandSpec,
    http: reqwest::Client,
}

impl LocalCommand {
    pub fn new(state: JobState, spec: LocalCommandSpec) -> Self {
        Self {
            state,
            spec,
            http: reqwest::Client::new(),
        }
    }

    pub fn spec(&self) -> &LocalCommandSpec {
        &self.spec
    }

    /// Downloads the script body to an executable temporary file
    ///
    /// The returned path deletes the file when dropped.
    async fn stage_script(&self, source: &str) -> anyhow::Result<TempPath> {
        if !(source.starts_with("http://") || source.starts_with("https://")) {
            bail!("unsupported script source scheme: {}", source);
        }

        debug!("Job {}: downloading script from {}", self.state.name(), source);
        let body = self
            .http
            .get(source)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .with_context(|| format!("Failed to download script from {}", source))?
            .bytes()
            .await
            .with_context(|| format!("Failed to read script body from {}", source))?;

        let mut file = tempfile::Builder::new()
            .prefix("sweep-script-")
            .tempfile()
            .context("Failed to create temporary script file")?;
        file.write_all(&body)
            .and_then(|_| file.flush())
            .context("Failed to write temporary script file")?;
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o755))
            .context("Failed to make temporary script executable")?;

        // Close our handle so the file can be executed
        let path = file.into_temp_path();
        debug!(
            "Job {}: staged {} bytes of script at {}",
            self.state.name(),
            body.len(),
            path.display()
        );
        Ok(path)
    }

    fn build_command(&self, script: Option<&TempPath>) -> anyhow::Result<Command> {
        let mut command = match (script, &self.spec.command) {
            (Some(path), _) => {
                let mut command = Command::new(path.as_os_str());
                command.args(&self.spec.script_args);
                command
            }
            (None, Some(spec)) if self.spec.shell => {
                let mut command = Command::new("/bin/sh");
                command.arg("-c").arg(spec.to_line());
                command
            }
            (None, Some(spec)) => {
                let argv = spec.to_argv()?;
                let Some((program, args)) = argv.split_first() else {
                    bail!("command is empty");
                };
                let mut command = Command::new(program);
                command.args(args);
                command
            }
            (None, None) => bail!("no command or script_source configured"),
        };
        command.envs(&self.spec.environment);
        Ok(command)
    }
}

#[async_trait]
impl Job for LocalCommand {
    fn state(&self) -> &JobState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut JobState {
        &mut self.state
    }

    async fn run(&mut self) -> anyhow::Result<RunOutcome> {
        debug!(
            "Job {}: running {} shell={} timeout={:?}",
            self.state.name(),
            self.report_description(),
            self.spec.shell,
            self.spec.timeout
        );
        self.state.mark_started();

        let script = match self.spec.script_source.clone() {
            Some(source) => match self.stage_script(&source).await {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(
                        "Job {}: failed to retrieve script: {:#}",
                        self.state.name(),
                        e
                    );
                    self.state.fail_setup(format!("{:#}", e));
                    return Ok(RunOutcome::Failed);
                }
            },
            None => None,
        };

        let options = CaptureOptions {
            timeout: self.spec.timeout(),
            ..CaptureOptions::default()
        };
        let result = match self.build_command(script.as_ref()) {
            Ok(command) => run_captured(command, options)
                .await
                .context("Failed to spawn command"),
            Err(e) => Err(e),
        };

        if let Some(path) = script {
            let shown = path.display().to_string();
            if let Err(e) = path.close() {
                warn!("Failed to remove temporary script {}: {}", shown, e);
            }
        }

        let captured = match result {
            Ok(captured) => captured,
            Err(e) => {
                self.state.fail_setup(format!("{:#}", e));
                return Err(e.context(format!("Job {} could not run", self.state.name())));
            }
        };

        if captured.timed_out {
            warn!(
                "LocalCommand {} timed out after {} seconds",
                self.state.name(),
                self.spec.timeout.unwrap_or_default()
            );
            self.state.mark_finished(EXIT_CODE_TIMEOUT, captured.output);
            return Ok(RunOutcome::Failed);
        }

        let exit_code = captured.exit_code().unwrap_or(1);
        info!("Job {}: command exited {}", self.state.name(), exit_code);
        self.state.mark_finished(exit_code, captured.output);
        Ok(RunOutcome::from_exit_code(exit_code))
    }

    fn report_description(&self) -> String {
        match (&self.spec.script_source, &self.spec.command) {
            (Some(source), _) if self.spec.script_args.is_empty() => source.clone(),
            (Some(source), _) => format!("{} {}", source, self.spec.script_args.join(" ")),
            (None, Some(command)) => command.to_string(),
            (None, None) => String::new(),
        }
    }

    fn error_repr(&self) -> String {
        let timeout = match self.spec.timeout {
            Some(secs) => format!("{}s", secs),
            None => "None".to_string(),
        };
        self.state.error_repr(&[
            ("Command", self.report_description()),
            ("Shell", self.spec.shell.to_string()),
            ("Timeout", timeout),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use sweep_core::domain::job::EXIT_CODE_SETUP_FAILURE;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves `body` to every HTTP request and returns the script URL
    async fn serve_script(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{}/backup.sh", addr)
    }

    fn script_job(source: String, args: &[&str], timeout: Option<u64>) -> LocalCommand {
        let mut job = LocalCommand::new(
            JobState::new("lc", "daily"),
            LocalCommandSpec {
                script_source: Some(source),
                script_args: args.iter().map(|a| a.to_string()).collect(),
                timeout,
                ..LocalCommandSpec::default()
            },
        );
        job.http = reqwest::Client::builder().no_proxy().build().unwrap();
        job
    }

    /// Path the script reported for itself on its first output line
    fn staged_path(output: &str) -> &Path {
        let line = output.lines().next().unwrap();
        Path::new(line.strip_prefix("script=").unwrap())
    }

    fn shell_job(line: &str, timeout: Option<u64>) -> LocalCommand {
        LocalCommand::new(
            JobState::new("lc", "daily"),
            LocalCommandSpec {
                command: Some(CommandSpec::Line(line.to_string())),
                shell: true,
                timeout,
                ..LocalCommandSpec::default()
            },
        )
    }

    #[tokio::test]
    async fn test_run_success() {
        let mut job = LocalCommand::new(
            JobState::new("lc", "daily"),
            LocalCommandSpec {
                command: Some(CommandSpec::Argv(vec![
                    "echo".to_string(),
                    "hello".to_string(),
                ])),
                ..LocalCommandSpec::default()
            },
        );
        assert_eq!(job.run().await.unwrap(), RunOutcome::Succeeded);

        let state = job.state();
        assert!(state.is_started() && state.is_finished());
        assert_eq!(state.exit_code(), Some(0));
        assert_eq!(state.output(), Some("hello\n"));
        assert_eq!(job.summary(), "hello");
        assert!(job.poll().await);
    }

    #[tokio::test]
    async fn test_run_failure_combines_output() {
        let mut job = shell_job("echo out; echo err 1>&2; exit 3", None);
        assert_eq!(job.run().await.unwrap(), RunOutcome::Failed);
        assert_eq!(job.state().exit_code(), Some(3));
        let output = job.state().output().unwrap();
        assert!(output.contains("out"));
        assert!(output.contains("err"));
    }

    #[tokio::test]
    async fn test_timeout_sets_sentinel() {
        let mut job = shell_job("echo partial; sleep 10", Some(1));
        assert_eq!(job.run().await.unwrap(), RunOutcome::Failed);

        let state = job.state();
        assert!(state.is_finished());
        assert_eq!(state.exit_code(), Some(EXIT_CODE_TIMEOUT));
        assert_eq!(state.output(), Some("partial\n"));
    }

    #[tokio::test]
    async fn test_environment_is_passed() {
        let mut job = shell_job("echo \"value=$SWEEP_TEST_VALUE\"", None);
        job.spec
            .environment
            .insert("SWEEP_TEST_VALUE".to_string(), "42".to_string());
        job.run().await.unwrap();
        assert_eq!(job.state().output(), Some("value=42\n"));
    }

    #[tokio::test]
    async fn test_unsupported_script_scheme_is_setup_failure() {
        let mut job = LocalCommand::new(
            JobState::new("lc", "daily"),
            LocalCommandSpec {
                script_source: Some("s3://bucket/scripts/backup.sh".to_string()),
                ..LocalCommandSpec::default()
            },
        );
        assert_eq!(job.run().await.unwrap(), RunOutcome::Failed);

        let state = job.state();
        assert!(state.is_started() && state.is_finished());
        assert_eq!(state.exit_code(), Some(EXIT_CODE_SETUP_FAILURE));
        assert!(state.output().unwrap().contains("unsupported script source"));
    }

    #[tokio::test]
    async fn test_unreachable_script_is_setup_failure() {
        let mut job = LocalCommand::new(
            JobState::new("lc", "daily"),
            LocalCommandSpec {
                script_source: Some("http://127.0.0.1:9/backup.sh".to_string()),
                ..LocalCommandSpec::default()
            },
        );
        assert_eq!(job.run().await.unwrap(), RunOutcome::Failed);
        assert_eq!(job.state().exit_code(), Some(EXIT_CODE_SETUP_FAILURE));
        assert!(
            job.state()
                .output()
                .unwrap()
                .contains("Failed to download script")
        );
    }

    #[tokio::test]
    async fn test_staged_script_runs_with_args_and_is_removed() {
        let url = serve_script("#!/bin/sh\necho \"script=$0\"\necho \"args=$*\"\nexit 3\n").await;
        let mut job = script_job(url, &["--full", "--dry-run"], None);

        assert_eq!(job.run().await.unwrap(), RunOutcome::Failed);

        let state = job.state();
        assert!(state.is_started() && state.is_finished());
        assert_eq!(state.exit_code(), Some(3));
        let output = state.output().unwrap();
        assert!(output.ends_with("\nargs=--full --dry-run\n"));
        let path = staged_path(output);
        assert!(
            path.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("sweep-script-")
        );
        assert!(!path.exists());
        assert_eq!(job.summary(), "args=--full --dry-run");
    }

    #[tokio::test]
    async fn test_staged_script_is_removed_after_timeout() {
        let url = serve_script("#!/bin/sh\necho \"script=$0\"\nsleep 10\n").await;
        let mut job = script_job(url, &[], Some(1));

        assert_eq!(job.run().await.unwrap(), RunOutcome::Failed);

        let state = job.state();
        assert_eq!(state.exit_code(), Some(EXIT_CODE_TIMEOUT));
        assert!(!staged_path(state.output().unwrap()).exists());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_error() {
        let mut job = LocalCommand::new(
            JobState::new("lc", "daily"),
            LocalCommandSpec {
                command: Some(CommandSpec::Line("/nonexistent/sweep/cmd".to_string())),
                ..LocalCommandSpec::default()
            },
        );
        assert!(job.run().await.is_err());
        assert!(job.state().is_finished());
        assert_eq!(job.state().exit_code(), Some(EXIT_CODE_SETUP_FAILURE));
    }

    #[test]
    fn test_report_description() {
        let job = shell_job("echo hi", None);
        assert_eq!(job.report_description(), "echo hi");

        let script = LocalCommand::new(
            JobState::new("lc", "daily"),
            LocalCommandSpec {
                script_source: Some("https://example.com/run.sh".to_string()),
                script_args: vec!["--full".to_string()],
                ..LocalCommandSpec::default()
            },
        );
        assert_eq!(script.report_description(), "https://example.com/run.sh --full");
        assert!(script.error_repr().contains("Timeout: None\n"));
    }
}
