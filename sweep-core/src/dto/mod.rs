//! Data Transfer Objects for the remote task API
//!
//! These types are exchanged between the `RemoteTask` job variant and the
//! HTTP client that talks to the task service.

pub mod task;
