//! Configuration errors

use std::path::PathBuf;
use sweep_client::ClientError;
use sweep_core::CronError;
use thiserror::Error;

/// Errors raised while loading, validating or materializing configuration
///
/// All of these are reported before any job runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{0} is neither a YAML file nor a directory")]
    NotYaml(PathBuf),

    #[error("job name \"{0}\" is defined more than once")]
    DuplicateJobName(String),

    #[error("invalid cron_expression for job \"{job}\": {source}")]
    InvalidCron {
        job: String,
        #[source]
        source: CronError,
    },

    #[error("invalid summary_regex for job \"{job}\": {source}")]
    InvalidRegex {
        job: String,
        #[source]
        source: regex::Error,
    },

    #[error("{setting} is required: {reason}")]
    MissingSetting {
        setting: &'static str,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("unknown schedule name(s): {}", .0.join(", "))]
    UnknownSchedules(Vec<String>),

    #[error("unknown job name(s): {}", .0.join(", "))]
    UnknownJobs(Vec<String>),

    #[error("failed to build task API client: {0}")]
    Client(#[from] ClientError),
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}
