//! Runner configuration
//!
//! Configuration is YAML, either a single file holding `global` settings and
//! a `jobs` list, or a directory where `global.yml` holds the settings and
//! every other YAML file holds one job. Loading parses and validates; turning
//! definitions into runnable jobs happens in [`JobRegistry`].

mod error;
mod jobs;
mod registry;

pub use error::ConfigError;
pub use jobs::{JobDefinition, JobKind};
pub use registry::{Backends, JobRegistry};

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const YAML_EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// Settings that apply to every batch
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalSettings {
    /// Seconds to sleep between poll sweeps
    pub inter_poll_sleep_sec: u64,

    /// Seconds after which a batch stops launching and polling
    pub max_total_runtime_sec: u64,

    /// Base URL of the remote task service (required for RemoteTask jobs)
    pub task_api_url: Option<String>,

    /// Container CLI used by exec jobs ("docker" or "podman")
    pub container_runtime: String,

    /// Only print the report when something failed
    pub only_report_if_problems: bool,

    /// Also write the plain-text report to this file
    pub report_path: Option<PathBuf>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            inter_poll_sleep_sec: 10,
            max_total_runtime_sec: 3600,
            task_api_url: None,
            container_runtime: "docker".to_string(),
            only_report_if_problems: false,
            report_path: None,
        }
    }
}

impl GlobalSettings {
    pub fn inter_poll_sleep(&self) -> Duration {
        Duration::from_secs(self.inter_poll_sleep_sec)
    }

    pub fn max_total_runtime(&self) -> Duration {
        Duration::from_secs(self.max_total_runtime_sec)
    }

    /// Applies overrides from environment variables
    ///
    /// Recognized variables:
    /// - SWEEP_TASK_API_URL
    /// - SWEEP_CONTAINER_RUNTIME
    /// - SWEEP_INTER_POLL_SLEEP_SEC
    /// - SWEEP_MAX_TOTAL_RUNTIME_SEC
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let seconds = |key: &str| -> Result<Option<u64>, ConfigError> {
            lookup(key)
                .map(|value| {
                    value.trim().parse::<u64>().map_err(|_| {
                        ConfigError::invalid(format!("{} must be a number of seconds", key))
                    })
                })
                .transpose()
        };

        if let Some(url) = lookup("SWEEP_TASK_API_URL") {
            debug!("Overriding task_api_url from environment");
            self.task_api_url = Some(url);
        }
        if let Some(runtime) = lookup("SWEEP_CONTAINER_RUNTIME") {
            self.container_runtime = runtime;
        }
        if let Some(secs) = seconds("SWEEP_INTER_POLL_SLEEP_SEC")? {
            self.inter_poll_sleep_sec = secs;
        }
        if let Some(secs) = seconds("SWEEP_MAX_TOTAL_RUNTIME_SEC")? {
            self.max_total_runtime_sec = secs;
        }
        Ok(())
    }

    /// Validates the settings on their own
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inter_poll_sleep_sec == 0 {
            return Err(ConfigError::invalid(
                "inter_poll_sleep_sec must be greater than 0",
            ));
        }

        if self.max_total_runtime_sec == 0 {
            return Err(ConfigError::invalid(
                "max_total_runtime_sec must be greater than 0",
            ));
        }

        if self.container_runtime.trim().is_empty() {
            return Err(ConfigError::invalid("container_runtime cannot be empty"));
        }

        if let Some(url) = &self.task_api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::invalid(
                    "task_api_url must start with http:// or https://",
                ));
            }
        }

        Ok(())
    }
}

/// Complete configuration: global settings plus job definitions
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalSettings,
    #[serde(default)]
    pub jobs: Vec<JobDefinition>,
}

impl Config {
    /// Loads configuration from a YAML file or a directory of YAML files
    ///
    /// Environment overrides are applied and the result is validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.is_dir() {
            info!("Loading multi-file configuration from {}", path.display());
            Self::from_dir(path)?
        } else if is_yaml(path) {
            info!("Loading configuration from single file {}", path.display());
            Self::from_yaml_str(&read(path)?, &path.display().to_string())?
        } else {
            return Err(ConfigError::NotYaml(path.to_path_buf()));
        };

        config.global.apply_env_overrides()?;
        config.validate()?;
        info!("Loaded {} job definition(s)", config.jobs.len());
        Ok(config)
    }

    /// Parses a single-document configuration
    pub fn from_yaml_str(yaml: &str, origin: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })
    }

    /// Reads `global.yml` (or `global.yaml`) and one job per other YAML file,
    /// in file name order
    fn from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let entries = std::fs::read_dir(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ConfigError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && is_yaml(&path) {
                files.push(path);
            }
        }
        files.sort();

        let mut config = Config::default();
        for file in files {
            let origin = file.display().to_string();
            let contents = read(&file)?;
            let is_global = file
                .file_stem()
                .is_some_and(|stem| stem == "global");

            if is_global {
                debug!("Reading global settings from {}", origin);
                config.global = parse_yaml(&contents, &origin)?;
            } else {
                debug!("Reading job definition from {}", origin);
                config.jobs.push(parse_yaml(&contents, &origin)?);
            }
        }

        Ok(config)
    }

    /// Validates settings and every job definition
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.global.validate()?;

        let mut names = HashSet::new();
        for job in &self.jobs {
            job.validate()?;
            if !names.insert(job.name.as_str()) {
                return Err(ConfigError::DuplicateJobName(job.name.clone()));
            }
            if matches!(job.kind, JobKind::RemoteTask(_)) && self.global.task_api_url.is_none() {
                return Err(ConfigError::MissingSetting {
                    setting: "task_api_url",
                    reason: format!("job \"{}\" is a RemoteTask", job.name),
                });
            }
        }

        Ok(())
    }

    /// All distinct schedule names, sorted
    pub fn schedule_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.jobs.iter().map(|j| j.schedule.clone()).collect();
        names.sort();
        names.dedup();
        names
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| YAML_EXTENSIONS.contains(&ext))
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_yaml<T: serde::de::DeserializeOwned>(yaml: &str, origin: &str) -> Result<T, ConfigError> {
    serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
        origin: origin.to_string(),
        source,
    })
}
