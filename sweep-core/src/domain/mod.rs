//! Core domain types
//!
//! This module contains the structures shared by every job variant and by the
//! scheduling engine: per-job state, run outcomes, the cron gate and the
//! result of a batch.

pub mod batch;
pub mod cron;
pub mod job;
