//! Remote named-state fetch
//!
//! One small HTTP concern: fetch the text body of
//! `<base_url>/<name>.txt` with a bounded timeout. The body is opaque
//! here; the container importer classifies whatever comes back.

use std::time::Duration;

use thiserror::Error;

use crate::observability::Logger;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("fetch of state '{0}' timed out")]
    Timeout(String),
    #[error("fetch of state '{name}' failed: {reason}")]
    Http { name: String, reason: String },
    #[error("fetch of state '{name}' returned status {status}")]
    Status { name: String, status: u16 },
}

pub type StateResult<T> = Result<T, StateError>;

/// Fetches named remote state as text
pub struct RemoteStateLoader {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl RemoteStateLoader {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }

    /// GET `<base_url>/<name>.txt`, bounded by the configured timeout.
    /// Non-2xx and timeouts are recoverable errors, never a hang.
    pub async fn fetch(&self, name: &str) -> StateResult<String> {
        let url = format!("{}/{}.txt", self.base_url.trim_end_matches('/'), name);

        let request = self.client.get(&url).send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| {
                Logger::warn("STATE_FETCH_TIMEOUT", &[("name", name)]);
                StateError::Timeout(name.to_string())
            })?
            .map_err(|e| StateError::Http {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            Logger::warn(
                "STATE_FETCH_FAILED",
                &[("name", name), ("status", status.as_str())],
            );
            return Err(StateError::Status {
                name: name.to_string(),
                status: status.as_u16(),
            });
        }

        let body = tokio::time::timeout(self.timeout, response.text())
            .await
            .map_err(|_| StateError::Timeout(name.to_string()))?
            .map_err(|e| StateError::Http {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        Logger::info(
            "STATE_FETCHED",
            &[("name", name), ("bytes", &body.len().to_string())],
        );
        Ok(body)
    }
}
