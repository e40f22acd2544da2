//! Sweep runner
//!
//! Loads job configuration, materializes jobs wired to their backends and
//! runs them in batches:
//! - `config`: YAML configuration, validation and job selection
//! - `jobs`: local command, remote task and container exec jobs
//! - `scheduler`: the batch engine
//! - `report`: the reporting seam and the plain-text report
//! - `container` / `repository` / `process`: backend adapters

pub mod config;
pub mod container;
pub mod jobs;
pub mod process;
pub mod report;
pub mod repository;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{Backends, Config, ConfigError, GlobalSettings, JobRegistry};
pub use report::Reporter;
pub use scheduler::{Runner, RunnerSettings};
