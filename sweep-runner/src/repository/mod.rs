//! Repository layer
//!
//! Repositories are stateless clients that abstract communication with
//! remote services. They provide simple, focused interfaces without any
//! business logic, and are trait-based to enable testing with fakes.

mod tasks;

pub use tasks::{HttpTaskRepository, TaskRepository};
