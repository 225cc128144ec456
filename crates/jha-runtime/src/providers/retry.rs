//! Bounded retry of rate-limited model calls.
//!
//! Only [`ProviderError::RateLimited`] is retried. Every other error is
//! surfaced on the first attempt, and the last rate-limit error is
//! surfaced once attempts run out.

use backon::{ExponentialBuilder, Retryable};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use super::ProviderError;

/// Retry settings for HTTP adapters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Zero disables retrying.
    pub max_retries: usize,
    #[serde(with = "crate::config::humantime_duration")]
    pub min_delay: Duration,
    #[serde(with = "crate::config::humantime_duration")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Read `retry` from adapter settings, defaulting when absent.
    pub fn from_settings(settings: &serde_json::Value) -> Result<Self, ProviderError> {
        match settings.get("retry") {
            None | Some(serde_json::Value::Null) => Ok(Self::default()),
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| ProviderError::NotConfigured(format!("invalid retry settings: {}", e))),
        }
    }

    /// Run `op`, retrying rate-limit errors with exponential backoff.
    pub async fn run<T, F, Fut>(&self, label: &str, op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries);

        op.retry(backoff)
            .sleep(tokio::time::sleep)
            .when(|e| matches!(e, ProviderError::RateLimited { .. }))
            .notify(|e, delay| {
                tracing::warn!(adapter = label, error = %e, delay = ?delay, "rate limited, retrying");
            })
            .await
    }
}
