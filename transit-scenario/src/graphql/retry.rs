//! Fixed-delay retry wrapper for query clients.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use super::client::QueryClient;
use super::error::QueryError;

/// Retry settings for [`RetryingClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure.
    pub max_retries: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_millis(1000),
        }
    }
}

/// A [`QueryClient`] wrapper that retries any failure after a fixed delay.
///
/// With `max_retries = n` the inner client is called at most `n + 1` times.
/// When every attempt fails the last error is returned inside
/// [`QueryError::ExhaustedRetries`].
pub struct RetryingClient<C> {
    pub inner: C,
    pub policy: RetryPolicy,
}

impl<C> RetryingClient<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<C: QueryClient> QueryClient for RetryingClient<C> {
    async fn query(&self, document: &str, variables: Value) -> Result<Value, QueryError> {
        let max_attempts = self.policy.max_retries + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.inner.query(document, variables.clone()).await {
                Ok(data) => return Ok(data),
                Err(e) => {
                    if attempt >= max_attempts {
                        if attempt == 1 {
                            return Err(e);
                        }
                        return Err(QueryError::ExhaustedRetries {
                            attempts: attempt,
                            source: Box::new(e),
                        });
                    }
                    warn!(
                        error = %e,
                        attempt,
                        delay_ms = self.policy.delay.as_millis() as u64,
                        "Query failed, retrying"
                    );
                    tokio::time::sleep(self.policy.delay).await;
                }
            }
        }
    }
}
