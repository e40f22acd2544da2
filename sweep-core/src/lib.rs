//! Sweep Core
//!
//! Core types and abstractions for the Sweep batch job runner.
//!
//! This crate contains:
//! - Domain types: job state, run outcomes, batch results, cron gating
//! - The `Job` trait every job variant implements
//! - DTOs: Data transfer objects for the remote task API

pub mod domain;
pub mod dto;
pub mod error;
pub mod job;

pub use error::CronError;
pub use job::Job;
