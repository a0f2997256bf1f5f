//! HTTP CaseReporter implementation.

use async_trait::async_trait;
use decoy_core::error::{DecoyError, Result};
use decoy_core::report::{CaseReporter, FinalResult};
use reqwest::Client;
use std::time::Duration;

/// Posts final results to the case-management endpoint.
///
/// Delivery is best-effort by contract: the caller dispatches it
/// fire-and-forget and only logs the outcome, so this type reports failures
/// as errors but performs no retries of its own.
pub struct HttpCaseReporter {
    client: Client,
    url: String,
}

impl HttpCaseReporter {
    /// Creates a reporter for `url` with a fixed per-request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DecoyError::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl CaseReporter for HttpCaseReporter {
    async fn deliver(&self, result: &FinalResult) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(result)
            .send()
            .await
            .map_err(|e| DecoyError::external(format!("Final result delivery failed: {e}")))?;

        let status = response.status();
        tracing::info!(
            "[HttpCaseReporter] Delivered result for session {}: HTTP {}",
            result.session_id,
            status
        );

        if !status.is_success() {
            return Err(DecoyError::external(format!(
                "Case-management endpoint answered HTTP {status}"
            )));
        }
        Ok(())
    }
}
