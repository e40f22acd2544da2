//! Subprocess execution with combined output capture
//!
//! Used by local command jobs and by the container runtime adapter. STDOUT
//! and STDERR are drained concurrently into one buffer, so the captured text
//! keeps the order in which the child wrote it. When a timeout is given and
//! expires, the child is killed and whatever was captured so far is kept.

use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long to keep reading after a timed-out child was killed
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Which streams to capture and how long to wait
#[derive(Debug, Clone, Copy)]
pub struct CaptureOptions {
    pub stdout: bool,
    pub stderr: bool,
    pub timeout: Option<Duration>,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            stdout: true,
            stderr: true,
            timeout: None,
        }
    }
}

/// Result of running a captured subprocess
#[derive(Debug)]
pub struct Captured {
    /// Combined output, lossily decoded as UTF-8
    pub output: String,
    /// Exit status; `None` when the child was killed after a timeout
    pub status: Option<ExitStatus>,
    pub timed_out: bool,
}

impl Captured {
    /// Exit code of the child; 1 if it was terminated by a signal
    pub fn exit_code(&self) -> Option<i32> {
        self.status.map(|status| status.code().unwrap_or(1))
    }
}

/// Spawns `command` and waits for it, capturing its output
///
/// Returns an error only if the process could not be spawned or waited on.
pub async fn run_captured(mut command: Command, options: CaptureOptions) -> std::io::Result<Captured> {
    command
        .stdin(Stdio::null())
        .stdout(if options.stdout {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stderr(if options.stderr {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .kill_on_drop(true);

    let mut child = command.spawn()?;
    debug!("Spawned child process {:?}", child.id());

    let buffer = Arc::new(Mutex::new(Vec::new()));
    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(stdout, Arc::clone(&buffer)));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(stderr, Arc::clone(&buffer)));
    }

    let (status, timed_out) = match options.timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => (Some(status?), false),
            Err(_) => {
                warn!("Child process {:?} timed out after {:?}; killing", child.id(), limit);
                if let Err(e) = child.start_kill() {
                    warn!("Failed to kill timed out child process: {}", e);
                }
                let _ = child.wait().await;
                (None, true)
            }
        },
        None => (Some(child.wait().await?), false),
    };

    for mut reader in readers {
        if timed_out {
            // Grandchildren may still hold the pipe open; don't wait on them
            if tokio::time::timeout(DRAIN_GRACE, &mut reader).await.is_err() {
                reader.abort();
            }
        } else {
            let _ = reader.await;
        }
    }

    let bytes = buffer.lock().unwrap_or_else(|e| e.into_inner()).clone();
    Ok(Captured {
        output: String::from_utf8_lossy(&bytes).into_owned(),
        status,
        timed_out,
    })
}

fn spawn_reader<R>(mut stream: R, buffer: Arc<Mutex<Vec<u8>>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 8192];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => buffer
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .extend_from_slice(&chunk[..n]),
                Err(e) => {
                    debug!("Error reading child output: {}", e);
                    break;
                }
            }
        }
    })
}
