//! Request pipeline: ordered, immutable chain of cross-cutting policies.
//!
//! Every outgoing request, batch top-level requests included, flows through
//! the same chain. The chain is assembled once by [`PipelineBuilder`] at
//! client construction and never reordered at runtime; its head-to-tail order
//! is an external contract:
//!
//! ```text
//!  1. message shape        -- body finalization before anything reads it
//!  2. static headers       -- user agent, date, correlation id, api version
//!  3. content validation   -- checksum over the final body
//!  4. request hook         -- caller-supplied pre-send interception
//!  5. credential           -- signs/authorizes over the fixed bytes
//!  6. redirect
//!  7. host selection       -- primary vs. secondary endpoint
//!  8. retry                -- wraps the attempt loop below it
//!  9. response logging
//! 10. response hook        -- caller-supplied post-receive interception
//! 11. tracing span         -- per-attempt span with timing
//! 12. HTTP logging         -- final resolved request/outcome
//!  +  caller-supplied policies, appended strictly after the built-ins
//! ```
//!
//! Policies implement a uniform interface: inspect/modify the request, call
//! [`Next::run`] to forward, inspect/modify the response. Sans-I/O policies
//! only override [`Policy::prepare`], which is also the reduced subset applied
//! to batch sub-requests (headers + credential, nothing else).

pub mod auth;
pub mod observability;
pub mod retry;
pub mod routing;
pub mod standard;

use crate::http::{RequestContext, RequestOptions, StorageRequest, StorageResponse};
use crate::transport::{HttpTransport, Transport};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

pub use retry::RetryOptions;

/// A unit in the processing chain.
///
/// Implementations must be `Send + Sync`: the pipeline is shared across tasks
/// and a policy may be invoked concurrently for independent requests. Any
/// per-call state belongs in the [`RequestContext`], not in the policy.
#[async_trait]
pub trait Policy: Send + Sync {
    /// Stable name, used for logging and order inspection.
    fn name(&self) -> &'static str;

    /// Sans-I/O request preparation.
    ///
    /// This is the part of a policy that can run without forwarding: batch
    /// encoding applies `prepare` of the reduced policy subset to each
    /// sub-request instead of running the full chain per part.
    async fn prepare(&self, _request: &mut StorageRequest) -> Result<()> {
        Ok(())
    }

    /// Process the request and forward it down the chain.
    ///
    /// The default prepares the request and forwards; policies that need to
    /// observe the response or control the forwarding (retry, redirect,
    /// tracing) override this.
    async fn process(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<StorageResponse> {
        self.prepare(&mut ctx.request).await?;
        next.run(ctx).await
    }
}

impl std::fmt::Debug for dyn Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Policy").field("name", &self.name()).finish()
    }
}

/// Handle to the remainder of the chain.
///
/// `Copy` on purpose: retry and redirect re-run their downstream segment by
/// reusing the same handle for every attempt.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    policies: &'a [Arc<dyn Policy>],
    transport: &'a dyn Transport,
}

impl<'a> Next<'a> {
    pub(crate) fn new(policies: &'a [Arc<dyn Policy>], transport: &'a dyn Transport) -> Self {
        Self {
            policies,
            transport,
        }
    }

    /// Forward to the next policy, or to the transport at the end of the
    /// chain.
    pub async fn run(self, ctx: &mut RequestContext) -> Result<StorageResponse> {
        match self.policies.split_first() {
            Some((head, rest)) => {
                let next = Next {
                    policies: rest,
                    transport: self.transport,
                };
                head.process(ctx, next).await
            }
            None => self.transport.send(&ctx.request).await,
        }
    }
}

/// Immutable policy chain plus its transport.
///
/// Built once per client; safe to invoke concurrently. No shared mutable
/// state is written during a send.
pub struct Pipeline {
    policies: Vec<Arc<dyn Policy>>,
    /// Reduced subset applied to batch sub-requests: headers, then credential.
    part_policies: Vec<Arc<dyn Policy>>,
    transport: Arc<dyn Transport>,
}

impl Pipeline {
    /// Send a request through the full chain with default options.
    pub async fn send(&self, request: StorageRequest) -> Result<StorageResponse> {
        self.send_with(request, RequestOptions::default()).await
    }

    /// Send a request through the full chain.
    pub async fn send_with(
        &self,
        request: StorageRequest,
        options: RequestOptions,
    ) -> Result<StorageResponse> {
        let mut ctx = RequestContext::new(request);
        ctx.validate_content = options.validate_content;
        ctx.use_secondary = options.use_secondary;
        Next::new(&self.policies, self.transport.as_ref())
            .run(&mut ctx)
            .await
    }

    /// Apply the reduced policy subset (headers, then credential) to a batch
    /// sub-request. Sub-requests never traverse the full chain.
    pub(crate) async fn prepare_part(&self, request: &mut StorageRequest) -> Result<()> {
        for policy in &self.part_policies {
            policy.prepare(request).await?;
        }
        Ok(())
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    /// Names of the chained policies, head to tail.
    pub fn policy_names(&self) -> Vec<&'static str> {
        self.policies.iter().map(|p| p.name()).collect()
    }

    /// Derive a pipeline sharing this one's policies but borrowing the
    /// transport through a [`crate::transport::TransportWrapper`], so closing
    /// the derived pipeline's transport is a no-op.
    pub fn borrowed(&self) -> Pipeline {
        Pipeline {
            policies: self.policies.clone(),
            part_policies: self.part_policies.clone(),
            transport: Arc::new(crate::transport::TransportWrapper::new(
                self.transport.clone(),
            )),
        }
    }
}

/// Assembles the ordered chain.
///
/// Keep this surface area small and predictable: the order in the module docs
/// is fixed here and nowhere else.
pub struct PipelineBuilder {
    api_version: String,
    credential_policy: Option<Arc<dyn Policy>>,
    transport: Option<Arc<dyn Transport>>,
    request_hook: Option<standard::RequestHookFn>,
    response_hook: Option<standard::ResponseHookFn>,
    primary_hostname: String,
    secondary_hostname: Option<String>,
    retry: RetryOptions,
    additional_policies: Vec<Arc<dyn Policy>>,
}

impl PipelineBuilder {
    pub fn new(primary_hostname: impl Into<String>) -> Self {
        Self {
            api_version: crate::constants::DEFAULT_API_VERSION.to_string(),
            credential_policy: None,
            transport: None,
            request_hook: None,
            response_hook: None,
            primary_hostname: primary_hostname.into(),
            secondary_hostname: None,
            retry: RetryOptions::default(),
            additional_policies: Vec::new(),
        }
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Exactly one credential policy ends up in the chain; `None` keeps the
    /// pipeline anonymous.
    pub fn credential_policy(mut self, policy: Option<Arc<dyn Policy>>) -> Self {
        self.credential_policy = policy;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn request_hook(mut self, hook: standard::RequestHookFn) -> Self {
        self.request_hook = Some(hook);
        self
    }

    pub fn response_hook(mut self, hook: standard::ResponseHookFn) -> Self {
        self.response_hook = Some(hook);
        self
    }

    pub fn secondary_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.secondary_hostname = Some(hostname.into());
        self
    }

    pub fn retry(mut self, options: RetryOptions) -> Self {
        self.retry = options;
        self
    }

    /// Append a caller-supplied policy after the built-in chain. Additional
    /// policies are never interleaved with the built-ins.
    pub fn additional_policy(mut self, policy: Arc<dyn Policy>) -> Self {
        self.additional_policies.push(policy);
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new().map_err(|e| match e {
                Error::Configuration { message, context } => Error::Configuration {
                    message,
                    context: context.with_field_path("transport"),
                },
                other => other,
            })?),
        };

        let headers_policy: Arc<dyn Policy> =
            Arc::new(standard::StorageHeadersPolicy::new(self.api_version));

        let mut part_policies: Vec<Arc<dyn Policy>> = vec![headers_policy.clone()];
        if let Some(cred) = &self.credential_policy {
            part_policies.push(cred.clone());
        }

        let mut policies: Vec<Arc<dyn Policy>> = vec![
            Arc::new(standard::MessageShapePolicy),
            headers_policy,
            Arc::new(standard::ContentValidationPolicy),
            Arc::new(standard::RequestHookPolicy::new(self.request_hook)),
        ];
        if let Some(cred) = self.credential_policy {
            policies.push(cred);
        }
        policies.push(Arc::new(routing::RedirectPolicy::default()));
        policies.push(Arc::new(routing::StorageHostsPolicy::new(
            self.primary_hostname,
            self.secondary_hostname,
        )));
        policies.push(Arc::new(retry::RetryPolicy::new(self.retry)));
        policies.push(Arc::new(observability::ResponseLoggingPolicy));
        policies.push(Arc::new(standard::ResponseHookPolicy::new(
            self.response_hook,
        )));
        policies.push(Arc::new(observability::TracingPolicy));
        policies.push(Arc::new(observability::HttpLoggingPolicy));
        policies.extend(self.additional_policies);

        Ok(Pipeline {
            policies,
            part_policies,
            transport,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{SasCredential, StorageCredential};

    fn build(credential: &StorageCredential) -> Pipeline {
        PipelineBuilder::new("account.dfs.example.net")
            .credential_policy(credential.resolve().unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn chain_order_is_fixed_and_repeatable() {
        let cred = StorageCredential::Sas(SasCredential::new("sv=2025&sig=abc"));
        let first = build(&cred).policy_names();
        let second = build(&cred).policy_names();

        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![
                "message_shape",
                "storage_headers",
                "content_validation",
                "request_hook",
                "sas_credential",
                "redirect",
                "storage_hosts",
                "retry",
                "response_logging",
                "response_hook",
                "tracing",
                "http_logging",
            ]
        );
    }

    #[test]
    fn anonymous_chain_has_no_credential_policy() {
        let names = build(&StorageCredential::Anonymous).policy_names();
        assert!(!names.contains(&"sas_credential"));
        assert!(!names.contains(&"bearer_token"));
        assert_eq!(names.len(), 11);
    }

    #[test]
    fn additional_policies_are_appended_at_the_tail() {
        struct Marker;
        #[async_trait]
        impl Policy for Marker {
            fn name(&self) -> &'static str {
                "marker"
            }
        }

        let pipeline = PipelineBuilder::new("account.dfs.example.net")
            .additional_policy(Arc::new(Marker))
            .build()
            .unwrap();
        assert_eq!(pipeline.policy_names().last(), Some(&"marker"));
    }
}
