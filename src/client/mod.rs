//! Storage client: pipeline owner and batch entry point.

mod builder;

pub use builder::StorageClientBuilder;

use crate::batch::{self, BatchOptions, BatchParts, PartResponse, SubRequest};
use crate::constants::{BATCH_ACCEPTED_STATUS, HEADER_API_VERSION};
use crate::error::PartialBatchError;
use crate::http::{Method, StorageRequest, StorageResponse};
use crate::pipeline::Pipeline;
use crate::response::process_storage_error;
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;
use url::Url;

/// A client over one storage account endpoint.
///
/// The pipeline is assembled once at construction and reused, unchanged, for
/// every operation the client ever issues; the client is cheap to share
/// across tasks.
pub struct StorageClient {
    pipeline: Arc<Pipeline>,
    scheme: String,
    primary_hostname: String,
    api_version: String,
}

impl std::fmt::Debug for StorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageClient")
            .field("scheme", &self.scheme)
            .field("primary_hostname", &self.primary_hostname)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl StorageClient {
    pub fn builder(account_url: impl Into<String>) -> StorageClientBuilder {
        StorageClientBuilder::new(account_url)
    }

    pub(crate) fn from_parts(
        pipeline: Arc<Pipeline>,
        scheme: String,
        primary_hostname: String,
        api_version: String,
    ) -> Self {
        Self {
            pipeline,
            scheme,
            primary_hostname,
            api_version,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Send a single request through the full pipeline.
    pub async fn send(&self, request: StorageRequest) -> Result<StorageResponse> {
        self.pipeline.send(request).await
    }

    /// Derive a nested client that borrows this client's transport.
    ///
    /// The nested client shares the parent's policy chain; closing it is a
    /// no-op on the shared transport, so the parent keeps working after the
    /// nested client leaves scope.
    pub fn nested(&self) -> StorageClient {
        StorageClient {
            pipeline: Arc::new(self.pipeline.borrowed()),
            scheme: self.scheme.clone(),
            primary_hostname: self.primary_hostname.clone(),
            api_version: self.api_version.clone(),
        }
    }

    /// Enter the client's scope: opens the underlying transport.
    pub async fn open(&self) -> Result<()> {
        self.pipeline.transport().open().await
    }

    /// Exit the client's scope: closes the underlying transport (a no-op for
    /// nested clients). Subsequent sends on an owned, closed transport fail.
    pub async fn close(&self) -> Result<()> {
        self.pipeline.transport().close().await
    }

    /// Scoped use is asynchronous only.
    ///
    /// The synchronous form exists to fail fast with a descriptive error
    /// instead of partially opening the client.
    pub fn open_blocking(&self) -> Result<()> {
        Err(Error::configuration_with_context(
            "this client only supports asynchronous scoped use; call open().await",
            ErrorContext::new().with_source("storage_client"),
        ))
    }

    fn batch_url(&self, options: &BatchOptions) -> Result<Url> {
        let raw = format!(
            "{}://{}/{}?{}",
            self.scheme,
            self.primary_hostname,
            options.path.trim_start_matches('/'),
            options.query()
        );
        Url::parse(&raw).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid batch URL: {}", raw),
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("storage_client"),
            )
        })
    }

    /// Shared batch path: encode, send through the pipeline, classify the
    /// top-level outcome, and hand back the part sequence.
    async fn batch_send(
        &self,
        requests: Vec<SubRequest>,
        options: BatchOptions,
    ) -> Result<(StorageResponse, BatchParts)> {
        let boundary = batch::new_boundary();

        // Sub-requests pass through the reduced policy subset only: the
        // headers policy, then the credential policy when one is present.
        let mut parts = Vec::with_capacity(requests.len());
        for sub in requests {
            let mut request = sub.into_request();
            self.pipeline.prepare_part(&mut request).await?;
            parts.push(request);
        }

        let body = batch::encode_parts(&boundary, &parts);
        let request = StorageRequest::new(Method::POST, self.batch_url(&options)?)
            .with_header(HEADER_API_VERSION, self.api_version.clone())
            .with_header(
                "Content-Type",
                format!("multipart/mixed; boundary={}", boundary),
            )
            .with_body(body);

        let response = self.pipeline.send(request).await?;

        // Anything but 202 is a total failure: classify and raise without
        // ever looking at the parts.
        if response.status != BATCH_ACCEPTED_STATUS {
            return Err(process_storage_error(&response));
        }

        let response_boundary = response
            .headers
            .get("Content-Type")
            .and_then(|ct| ct.split("boundary=").nth(1))
            .map(|b| b.trim_matches('"').to_string())
            .ok_or_else(|| {
                Error::validation_with_context(
                    "batch response is missing its multipart boundary",
                    ErrorContext::new()
                        .with_field_path("response.headers.Content-Type")
                        .with_source("storage_client"),
                )
            })?;

        let parts = BatchParts::new(response.body.clone(), &response_boundary)?;
        Ok((response, parts))
    }

    /// Execute a batch eagerly.
    ///
    /// Materializes every part; if any part's status falls outside
    /// [200, 300), fails with [`Error::PartialBatch`] carrying the complete
    /// ordered part list (successes included). Otherwise returns the parts in
    /// submission order.
    pub async fn submit_batch(
        &self,
        requests: Vec<SubRequest>,
        options: BatchOptions,
    ) -> Result<Vec<PartResponse>> {
        let (response, parts) = self.batch_send(requests, options).await?;
        let parts: Vec<PartResponse> = parts.collect::<Result<_>>()?;

        if parts.iter().any(|p| !p.is_success()) {
            return Err(Error::PartialBatch(PartialBatchError { response, parts }));
        }
        Ok(parts)
    }

    /// Execute a batch without part-level failure checks.
    ///
    /// Returns a forward-only, single-use sequence of parts; no error is
    /// raised for individual part statuses. The caller is solely responsible
    /// for inspecting each part.
    pub async fn submit_batch_deferred(
        &self,
        requests: Vec<SubRequest>,
        options: BatchOptions,
    ) -> Result<BatchParts> {
        let (_, parts) = self.batch_send(requests, options).await?;
        Ok(parts)
    }
}
