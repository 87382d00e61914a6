//! Transport seam: the only place where wire-level HTTP happens.
//!
//! The pipeline depends on the [`Transport`] trait; the built-in
//! [`HttpTransport`] is a reqwest-backed implementation with production
//! defaults, and [`TransportWrapper`] lets a nested client borrow a parent's
//! transport without being able to shut it down.

use crate::constants::{CONNECTION_TIMEOUT, READ_TIMEOUT};
use crate::http::{Headers, StorageRequest, StorageResponse};
use crate::Result;
use async_trait::async_trait;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transport is closed")]
    Closed,

    #[error("transport error: {0}")]
    Other(String),
}

/// Asynchronous HTTP transport.
///
/// `send` is the single suspension point for network I/O. `open`/`close`
/// bracket the transport's scoped lifetime: owning clients close it on exit,
/// borrowing clients must not (see [`TransportWrapper`]).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &StorageRequest) -> Result<StorageResponse>;

    async fn open(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Default reqwest-backed transport.
pub struct HttpTransport {
    client: reqwest::Client,
    closed: AtomicBool,
}

impl HttpTransport {
    /// Build a transport with the runtime's timeout defaults
    /// (env-overridable).
    pub fn new() -> Result<Self> {
        let read_timeout = env::var("STORLAKE_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(READ_TIMEOUT);

        let builder = reqwest::Client::builder()
            .connect_timeout(CONNECTION_TIMEOUT)
            .timeout(read_timeout)
            .pool_max_idle_per_host(
                env::var("STORLAKE_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(32),
            )
            .pool_idle_timeout(Some(Duration::from_secs(
                env::var("STORLAKE_HTTP_POOL_IDLE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(90),
            )));

        let client = builder.build().map_err(|e| {
            crate::Error::configuration_with_context(
                "unable to construct the default async transport",
                crate::ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("transport"),
            )
        })?;

        Ok(Self {
            client,
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &StorageRequest) -> Result<StorageResponse> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed.into());
        }

        let mut req = self
            .client
            .request(request.method.clone(), request.url.clone());
        for (name, value) in request.headers.iter() {
            req = req.header(name, value);
        }
        if !request.body.is_empty() {
            req = req.body(request.body.clone());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| crate::Error::Transport(TransportError::Http(e)))?;

        let status = resp.status().as_u16();
        let reason = resp.status().canonical_reason().map(str::to_string);
        let mut headers = Headers::new();
        for (name, value) in resp.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str(), v);
            }
        }
        let body = resp
            .bytes()
            .await
            .map_err(|e| crate::Error::Transport(TransportError::Http(e)))?;

        Ok(StorageResponse {
            status,
            reason,
            headers,
            body,
        })
    }

    async fn close(&self) -> Result<()> {
        // reqwest has no explicit shutdown; refuse further sends so scoped
        // exit has observable semantics.
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Non-owning proxy over a shared transport.
///
/// A nested client derived from a parent (e.g. a directory client borrowed
/// from a filesystem client) uses this wrapper so that leaving the nested
/// client's scope never terminates the parent's transport: `send` delegates,
/// `open` and `close` are no-ops.
pub struct TransportWrapper {
    inner: Arc<dyn Transport>,
}

impl TransportWrapper {
    pub fn new(inner: Arc<dyn Transport>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Transport for TransportWrapper {
    async fn send(&self, request: &StorageRequest) -> Result<StorageResponse> {
        self.inner.send(request).await
    }

    async fn open(&self) -> Result<()> {
        // Already open; owned by the parent.
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // Deliberately not forwarded.
        Ok(())
    }
}
