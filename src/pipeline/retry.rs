//! Retry policy.
//!
//! Retries transport-level failures and transient service statuses with
//! capped exponential backoff. Each attempt re-runs only the chain segment
//! downstream of this policy; headers and signatures were fixed upstream and
//! are not recomputed here. Completed exchanges with business-level failure
//! signals (service errors, partial batch failures) are never retried at this
//! layer.

use crate::http::{RequestContext, StorageResponse};
use crate::pipeline::{Next, Policy};
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Statuses worth another attempt: timeouts, throttling, transient 5xx.
const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

#[derive(Debug, Clone)]
pub struct RetryOptions {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryOptions {
    /// Disable retries entirely (useful for tests and fail-fast callers).
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

pub struct RetryPolicy {
    options: RetryOptions,
}

impl RetryPolicy {
    pub fn new(options: RetryOptions) -> Self {
        Self { options }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.options.base_delay.as_millis() as u64;
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = base.saturating_mul(factor);
        Duration::from_millis(delay).min(self.options.max_delay)
    }

    fn retryable_error(err: &Error) -> bool {
        matches!(err, Error::Transport(_))
    }
}

#[async_trait]
impl Policy for RetryPolicy {
    fn name(&self) -> &'static str {
        "retry"
    }

    async fn process(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<StorageResponse> {
        let mut attempt = 0u32;
        loop {
            // Each attempt starts from the request as fixed by the upstream
            // policies; downstream mutations never leak across attempts.
            let mut attempt_ctx = ctx.clone();
            attempt_ctx.attempt = attempt;

            let outcome = next.run(&mut attempt_ctx).await;
            let exhausted = attempt >= self.options.max_retries;

            match outcome {
                Ok(response) => {
                    if exhausted || !RETRYABLE_STATUSES.contains(&response.status) {
                        return Ok(response);
                    }
                    tracing::debug!(
                        status = response.status,
                        attempt,
                        "transient status, retrying"
                    );
                }
                Err(err) => {
                    if exhausted || !Self::retryable_error(&err) {
                        return Err(err);
                    }
                    tracing::warn!(error = %err, attempt, "transport error, retrying");
                }
            }

            tokio::time::sleep(self.backoff(attempt)).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Headers, Method, StorageRequest};
    use crate::transport::Transport;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    struct FlakyTransport {
        calls: AtomicUsize,
        statuses: Vec<u16>,
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn send(&self, _request: &StorageRequest) -> Result<StorageResponse> {
            let n = self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(StorageResponse {
                status: self.statuses[n.min(self.statuses.len() - 1)],
                reason: None,
                headers: Headers::new(),
                body: Bytes::new(),
            })
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::new(StorageRequest::new(
            Method::GET,
            Url::parse("https://account.dfs.example.net/fs").unwrap(),
        ))
    }

    #[tokio::test]
    async fn retries_transient_statuses_until_success() {
        let transport = FlakyTransport {
            calls: AtomicUsize::new(0),
            statuses: vec![503, 503, 200],
        };
        let policy = RetryPolicy::new(RetryOptions {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        });

        let response = policy
            .process(&mut ctx(), Next::new(&[], &transport))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(transport.calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn surfaces_last_response_after_exhaustion() {
        let transport = FlakyTransport {
            calls: AtomicUsize::new(0),
            statuses: vec![500],
        };
        let policy = RetryPolicy::new(RetryOptions {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        });

        let response = policy
            .process(&mut ctx(), Next::new(&[], &transport))
            .await
            .unwrap();
        assert_eq!(response.status, 500);
        assert_eq!(transport.calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn non_retryable_status_returns_immediately() {
        let transport = FlakyTransport {
            calls: AtomicUsize::new(0),
            statuses: vec![404],
        };
        let policy = RetryPolicy::new(RetryOptions::default());

        let response = policy
            .process(&mut ctx(), Next::new(&[], &transport))
            .await
            .unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(transport.calls.load(Ordering::Relaxed), 1);
    }
}
