//! Built-in sans-I/O policies: body finalization, static headers, content
//! validation and caller-supplied hooks.

use crate::constants::{HEADER_API_VERSION, HEADER_CLIENT_REQUEST_ID, HEADER_DATE};
use crate::http::{RequestContext, StorageRequest, StorageResponse};
use crate::pipeline::{Next, Policy};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use md5::{Digest, Md5};
use std::sync::Arc;

pub type RequestHookFn = Arc<dyn Fn(&mut StorageRequest) + Send + Sync>;
pub type ResponseHookFn = Arc<dyn Fn(&StorageResponse) + Send + Sync>;

/// Finalizes the message body before any downstream policy reads it.
///
/// Runs first: checksums and signatures downstream must see the final bytes.
pub struct MessageShapePolicy;

#[async_trait]
impl Policy for MessageShapePolicy {
    fn name(&self) -> &'static str {
        "message_shape"
    }

    async fn prepare(&self, request: &mut StorageRequest) -> Result<()> {
        if !request.body.is_empty() {
            request
                .headers
                .insert_if_absent("Content-Type", "application/octet-stream");
        }
        request
            .headers
            .insert("Content-Length", request.body.len().to_string());
        Ok(())
    }
}

/// Injects the standard storage headers: api version, timestamp, correlation
/// id and user agent.
///
/// Part of the reduced subset applied to every batch sub-request.
pub struct StorageHeadersPolicy {
    api_version: String,
    user_agent: String,
}

impl StorageHeadersPolicy {
    pub fn new(api_version: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            user_agent: format!(
                "storlake/{} ({})",
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS
            ),
        }
    }
}

#[async_trait]
impl Policy for StorageHeadersPolicy {
    fn name(&self) -> &'static str {
        "storage_headers"
    }

    async fn prepare(&self, request: &mut StorageRequest) -> Result<()> {
        request
            .headers
            .insert(HEADER_API_VERSION, self.api_version.clone());
        request.headers.insert(
            HEADER_DATE,
            chrono::Utc::now()
                .format("%a, %d %b %Y %H:%M:%S GMT")
                .to_string(),
        );
        request
            .headers
            .insert_if_absent(HEADER_CLIENT_REQUEST_ID, uuid::Uuid::new_v4().to_string());
        request
            .headers
            .insert_if_absent("User-Agent", self.user_agent.clone());
        Ok(())
    }
}

/// Attaches `Content-MD5` over the final body and verifies the response
/// checksum when the service echoes one back.
///
/// Only active when the caller asked for content validation on this request;
/// must sit after body finalization and before the credential policy so
/// signing covers the checksum header.
pub struct ContentValidationPolicy;

impl ContentValidationPolicy {
    fn checksum(body: &[u8]) -> String {
        let mut hasher = Md5::new();
        hasher.update(body);
        BASE64.encode(hasher.finalize())
    }
}

#[async_trait]
impl Policy for ContentValidationPolicy {
    fn name(&self) -> &'static str {
        "content_validation"
    }

    async fn process(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<StorageResponse> {
        if ctx.validate_content && !ctx.request.body.is_empty() {
            let digest = Self::checksum(&ctx.request.body);
            ctx.request.headers.insert("Content-MD5", digest);
        }

        let validate = ctx.validate_content;
        let response = next.run(ctx).await?;

        if validate {
            if let Some(expected) = response.headers.get("Content-MD5") {
                if !response.body.is_empty() && Self::checksum(&response.body) != expected {
                    return Err(Error::validation_with_context(
                        "response body failed Content-MD5 validation",
                        ErrorContext::new()
                            .with_field_path("response.body")
                            .with_source("content_validation"),
                    ));
                }
            }
        }

        Ok(response)
    }
}

/// Caller-supplied pre-send interception point.
pub struct RequestHookPolicy {
    hook: Option<RequestHookFn>,
}

impl RequestHookPolicy {
    pub fn new(hook: Option<RequestHookFn>) -> Self {
        Self { hook }
    }
}

#[async_trait]
impl Policy for RequestHookPolicy {
    fn name(&self) -> &'static str {
        "request_hook"
    }

    async fn prepare(&self, request: &mut StorageRequest) -> Result<()> {
        if let Some(hook) = &self.hook {
            hook(request);
        }
        Ok(())
    }
}

/// Caller-supplied post-receive interception point.
pub struct ResponseHookPolicy {
    hook: Option<ResponseHookFn>,
}

impl ResponseHookPolicy {
    pub fn new(hook: Option<ResponseHookFn>) -> Self {
        Self { hook }
    }
}

#[async_trait]
impl Policy for ResponseHookPolicy {
    fn name(&self) -> &'static str {
        "response_hook"
    }

    async fn process(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<StorageResponse> {
        let response = next.run(ctx).await?;
        if let Some(hook) = &self.hook {
            hook(&response);
        }
        Ok(response)
    }
}
