//! # storlake
//!
//! Storage transport runtime: request-pipeline assembly and batched
//! multipart execution for cloud storage clients.
//!
//! ## Overview
//!
//! This library is the generic dispatch machinery beneath concrete storage
//! operations. It composes a deterministic, ordered chain of cross-cutting
//! HTTP behaviors (credential injection, content validation, host routing,
//! retry, tracing, logging) that applies consistently to every outgoing
//! request, and executes batches of independent sub-requests as a single
//! multipart exchange while distinguishing total from partial failure.
//!
//! ## Core Philosophy
//!
//! - **Build once, send many**: the pipeline is assembled once per client and
//!   reused, immutable, for every request
//! - **Explicit ordering**: the policy chain order is a contract, enforced by
//!   the builder rather than by inheritance
//! - **Typed failures**: configuration, transport, service and partial-batch
//!   errors are distinct categories with distinct propagation rules
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use storlake::{BatchOptions, Method, StorageClient, StorageCredential, SubRequest};
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> storlake::Result<()> {
//!     let client = StorageClient::builder("https://account.blob.core.windows.net")
//!         .credential(StorageCredential::parse("?sv=2025-01-05&sig=..."))
//!         .build()?;
//!
//!     let base = Url::parse("https://account.blob.core.windows.net").unwrap();
//!     let reqs = vec![
//!         SubRequest::new(Method::DELETE, base.join("/c/b0").unwrap()),
//!         SubRequest::new(Method::DELETE, base.join("/c/b1").unwrap()),
//!     ];
//!     let parts = client
//!         .submit_batch(reqs, BatchOptions { path: "c".into(), restype: Some("container".into()), ..Default::default() })
//!         .await?;
//!     assert_eq!(parts.len(), 2);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Client assembly, builder, scoped lifetime |
//! | [`pipeline`] | Ordered policy chain and built-in policies |
//! | [`batch`] | Multipart batch encoding, parsing, part sequences |
//! | [`credentials`] | Credential classification and resolution |
//! | [`transport`] | Transport trait, default HTTP transport, borrow wrapper |
//! | [`response`] | Service error decoding |

pub mod batch;
pub mod client;
pub mod constants;
pub mod credentials;
pub mod http;
pub mod pipeline;
pub mod response;
pub mod transport;

// Re-export main types for convenience
pub use batch::{BatchOptions, BatchParts, PartResponse, SubRequest};
pub use client::{StorageClient, StorageClientBuilder};
pub use credentials::{AccessToken, SasCredential, StorageCredential, TokenCredential};
pub use http::{Headers, Method, RequestOptions, StorageRequest, StorageResponse};
pub use pipeline::{Next, Pipeline, PipelineBuilder, Policy, RetryOptions};
pub use transport::{HttpTransport, Transport, TransportWrapper};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext, PartialBatchError, StorageServiceError};
