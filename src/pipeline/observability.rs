//! Logging and tracing policies.
//!
//! These sit at the tail of the chain, closest to the transport, so what they
//! record is the request exactly as it goes on the wire and the outcome of
//! each individual attempt.

use crate::http::{RequestContext, StorageResponse};
use crate::pipeline::{Next, Policy};
use crate::Result;
use async_trait::async_trait;
use tracing::Instrument;

/// Query parameters whose values never appear in logs or spans.
const REDACTED_QUERY_PARAMS: [&str; 2] = ["sig", "se"];

/// URL rendering with pre-signed token material removed.
fn redacted_url(url: &url::Url) -> String {
    let Some(query) = url.query() else {
        return url.to_string();
    };
    let redacted: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((k, _)) if REDACTED_QUERY_PARAMS.contains(&k) => format!("{}=REDACTED", k),
            _ => pair.to_string(),
        })
        .collect();
    let host = match (url.host_str(), url.port()) {
        (Some(h), Some(p)) => format!("{}:{}", h, p),
        (Some(h), None) => h.to_string(),
        _ => String::new(),
    };
    format!(
        "{}://{}{}?{}",
        url.scheme(),
        host,
        url.path(),
        redacted.join("&")
    )
}

/// Logs the response status and interesting headers at debug level.
pub struct ResponseLoggingPolicy;

#[async_trait]
impl Policy for ResponseLoggingPolicy {
    fn name(&self) -> &'static str {
        "response_logging"
    }

    async fn process(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<StorageResponse> {
        let response = next.run(ctx).await?;
        tracing::debug!(
            status = response.status,
            reason = response.reason.as_deref().unwrap_or(""),
            request_id = response.headers.get("x-ms-request-id").unwrap_or(""),
            "response received"
        );
        Ok(response)
    }
}

/// Wraps each attempt in a span carrying method, endpoint and attempt number.
pub struct TracingPolicy;

#[async_trait]
impl Policy for TracingPolicy {
    fn name(&self) -> &'static str {
        "tracing"
    }

    async fn process(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<StorageResponse> {
        let span = tracing::debug_span!(
            "storage_request",
            method = %ctx.request.method,
            url = %redacted_url(&ctx.request.url),
            attempt = ctx.attempt,
        );
        next.run(ctx).instrument(span).await
    }
}

/// Last policy before the transport: records the final resolved request and
/// its outcome with timing.
pub struct HttpLoggingPolicy;

#[async_trait]
impl Policy for HttpLoggingPolicy {
    fn name(&self) -> &'static str {
        "http_logging"
    }

    async fn process(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<StorageResponse> {
        let method = ctx.request.method.clone();
        let url = redacted_url(&ctx.request.url);
        let start = std::time::Instant::now();

        let outcome = next.run(ctx).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &outcome {
            Ok(response) => {
                tracing::debug!(%method, url, status = response.status, elapsed_ms, "http exchange")
            }
            Err(err) => tracing::warn!(%method, url, error = %err, elapsed_ms, "http exchange failed"),
        }
        outcome
    }
}
