//! Sweep task API client
//!
//! A small, type-safe HTTP client for the remote task service used by the
//! `RemoteTask` job variant. The service launches tasks made of one or more
//! containers, reports their status and serves each container's log text.
//!
//! # Example
//!
//! ```no_run
//! use sweep_client::TaskApiClient;
//! use sweep_core::dto::task::LaunchTaskRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = TaskApiClient::new("http://localhost:8080");
//!
//!     let launched = client.launch_task(&LaunchTaskRequest {
//!         cluster: "default".to_string(),
//!         task_definition_family: "nightly-backup".to_string(),
//!         overrides: vec![],
//!         started_by: Some("sweep".to_string()),
//!     }).await?;
//!
//!     let task = client.describe_task(&launched.task_id).await?;
//!     println!("task {} is {}", task.task_id, task.last_status);
//!     Ok(())
//! }
//! ```

pub mod error;
mod tasks;

pub use error::{ClientError, Result};

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// HTTP client for the remote task API
#[derive(Debug, Clone)]
pub struct TaskApiClient {
    /// Base URL of the task service (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl TaskApiClient {
    /// Create a new task API client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the task API (e.g., "http://localhost:8080")
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// Create a client whose requests give up after `timeout`
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, client))
    }

    /// Create a new task API client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the task service
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of an endpoint below the base URL
    ///
    /// Each segment is percent-encoded, so identifiers containing `/`, spaces
    /// or `?` stay within their own path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and deserialize a JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = Self::check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Check the status code and return the body as text
    async fn handle_text_response(&self, response: reqwest::Response) -> Result<String> {
        let response = Self::check_status(response).await?;

        response
            .text()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to read response body: {}", e)))
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(response)
    }
}
