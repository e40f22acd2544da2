//! Scheduler layer
//!
//! Runs batches of jobs: launching in order, polling asynchronous jobs and
//! enforcing the batch deadline.

pub mod runner;

pub use runner::{Runner, RunnerSettings};
