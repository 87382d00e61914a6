//! Builder for creating storage clients with custom configuration.
//!
//! Keep this surface area small and predictable: credential resolution and
//! pipeline assembly happen exactly once, in `build()`, and misconfiguration
//! fails there, before any network activity.

use crate::client::StorageClient;
use crate::constants::DEFAULT_API_VERSION;
use crate::credentials::StorageCredential;
use crate::pipeline::standard::{RequestHookFn, ResponseHookFn};
use crate::pipeline::{Policy, PipelineBuilder, RetryOptions};
use crate::transport::Transport;
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;
use url::Url;

pub struct StorageClientBuilder {
    account_url: String,
    credential: StorageCredential,
    api_version: String,
    secondary_hostname: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    request_hook: Option<RequestHookFn>,
    response_hook: Option<ResponseHookFn>,
    retry: RetryOptions,
    additional_policies: Vec<Arc<dyn Policy>>,
}

impl StorageClientBuilder {
    pub fn new(account_url: impl Into<String>) -> Self {
        Self {
            account_url: account_url.into(),
            credential: StorageCredential::Anonymous,
            api_version: DEFAULT_API_VERSION.to_string(),
            secondary_hostname: None,
            transport: None,
            request_hook: None,
            response_hook: None,
            retry: RetryOptions::default(),
            additional_policies: Vec::new(),
        }
    }

    pub fn credential(mut self, credential: StorageCredential) -> Self {
        self.credential = credential;
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Secondary endpoint for read routing.
    pub fn secondary_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.secondary_hostname = Some(hostname.into());
        self
    }

    /// Supply a transport instead of the built-in one (mock servers, shared
    /// transports via [`crate::transport::TransportWrapper`]).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Caller-supplied pre-send interception.
    pub fn request_hook(mut self, hook: RequestHookFn) -> Self {
        self.request_hook = Some(hook);
        self
    }

    /// Caller-supplied post-receive interception.
    pub fn response_hook(mut self, hook: ResponseHookFn) -> Self {
        self.response_hook = Some(hook);
        self
    }

    pub fn retry(mut self, options: RetryOptions) -> Self {
        self.retry = options;
        self
    }

    /// Append a policy after the built-in chain.
    pub fn additional_policy(mut self, policy: Arc<dyn Policy>) -> Self {
        self.additional_policies.push(policy);
        self
    }

    pub fn build(self) -> Result<StorageClient> {
        let url = Url::parse(&self.account_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid account URL: {}", self.account_url),
                ErrorContext::new()
                    .with_field_path("account_url")
                    .with_details(e.to_string())
                    .with_source("client_builder"),
            )
        })?;
        let host = url.host_str().ok_or_else(|| {
            Error::configuration_with_context(
                "account URL has no hostname",
                ErrorContext::new()
                    .with_field_path("account_url")
                    .with_source("client_builder"),
            )
        })?;
        let primary_hostname = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        // Resolve the credential first: an unsupported value must fail before
        // any pipeline construction proceeds.
        let credential_policy = self.credential.resolve()?;

        let mut pipeline = PipelineBuilder::new(primary_hostname.clone())
            .api_version(self.api_version.clone())
            .credential_policy(credential_policy)
            .retry(self.retry);
        if let Some(secondary) = self.secondary_hostname {
            pipeline = pipeline.secondary_hostname(secondary);
        }
        if let Some(transport) = self.transport {
            pipeline = pipeline.transport(transport);
        }
        if let Some(hook) = self.request_hook {
            pipeline = pipeline.request_hook(hook);
        }
        if let Some(hook) = self.response_hook {
            pipeline = pipeline.response_hook(hook);
        }
        for policy in self.additional_policies {
            pipeline = pipeline.additional_policy(policy);
        }

        Ok(StorageClient::from_parts(
            Arc::new(pipeline.build()?),
            url.scheme().to_string(),
            primary_hostname,
            self.api_version,
        ))
    }
}
