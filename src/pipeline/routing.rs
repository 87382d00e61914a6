//! Host selection and redirect handling.

use crate::http::{Method, RequestContext, StorageResponse};
use crate::pipeline::{Next, Policy};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;

/// Follows HTTP redirects up to a fixed limit.
///
/// Sits after the credential policy: a redirected request keeps its original
/// authorization, matching the service's same-account redirect behavior.
pub struct RedirectPolicy {
    max_redirects: u32,
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self { max_redirects: 10 }
    }
}

#[async_trait]
impl Policy for RedirectPolicy {
    fn name(&self) -> &'static str {
        "redirect"
    }

    async fn process(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<StorageResponse> {
        let mut redirects = 0;
        loop {
            let response = next.run(ctx).await?;
            let is_redirect = matches!(response.status, 301 | 302 | 303 | 307 | 308);
            if !is_redirect || redirects >= self.max_redirects {
                return Ok(response);
            }
            let Some(location) = response.headers.get("Location") else {
                return Ok(response);
            };
            let target = ctx.request.url.join(location).map_err(|e| {
                Error::validation_with_context(
                    format!("invalid redirect location: {}", location),
                    ErrorContext::new()
                        .with_details(e.to_string())
                        .with_source("redirect"),
                )
            })?;

            tracing::debug!(status = response.status, %target, "following redirect");
            ctx.request.url = target;
            if response.status == 303 {
                ctx.request.method = Method::GET;
                ctx.request.body = bytes::Bytes::new();
            }
            redirects += 1;
        }
    }
}

/// Routes the request to the primary or secondary endpoint.
///
/// The hostname baked into the caller's URL is replaced with the configured
/// endpoint so every request issued by a client lands on its account hosts.
/// Secondary routing is read-only: write methods always go to the primary.
pub struct StorageHostsPolicy {
    primary: String,
    secondary: Option<String>,
}

impl StorageHostsPolicy {
    pub fn new(primary: impl Into<String>, secondary: Option<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary,
        }
    }

    fn set_host(url: &mut url::Url, host: &str) -> Result<()> {
        // The configured hostname may carry a port (mock servers do).
        let (name, port) = match host.rsplit_once(':') {
            Some((name, port)) => match port.parse::<u16>() {
                Ok(port) => (name, Some(port)),
                Err(_) => (host, None),
            },
            None => (host, None),
        };
        url.set_host(Some(name)).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid endpoint hostname: {}", host),
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("storage_hosts"),
            )
        })?;
        url.set_port(port)
            .map_err(|_| {
                Error::configuration_with_context(
                    format!("invalid endpoint port in: {}", host),
                    ErrorContext::new().with_source("storage_hosts"),
                )
            })?;
        Ok(())
    }
}

#[async_trait]
impl Policy for StorageHostsPolicy {
    fn name(&self) -> &'static str {
        "storage_hosts"
    }

    async fn process(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<StorageResponse> {
        let readable = matches!(ctx.request.method, Method::GET | Method::HEAD);
        let host = if ctx.use_secondary && readable {
            match &self.secondary {
                Some(secondary) => secondary.as_str(),
                None => {
                    return Err(Error::configuration_with_context(
                        "secondary endpoint requested but none is configured",
                        ErrorContext::new()
                            .with_field_path("secondary_hostname")
                            .with_source("storage_hosts"),
                    ))
                }
            }
        } else {
            self.primary.as_str()
        };
        Self::set_host(&mut ctx.request.url, host)?;
        next.run(ctx).await
    }
}
