use crate::batch::PartResponse;
use crate::http::StorageResponse;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "credential", "transport")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "credential_resolver", "pipeline_builder")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Unified error type for the storage transport runtime.
///
/// Construction-time misconfiguration, transport failures, decoded service
/// errors and batch partial failures are kept as distinct categories because
/// they have different propagation rules: configuration errors are never
/// retried, transport errors are retried by the pipeline before surfacing,
/// and service / partial-batch errors represent a completed exchange.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error(transparent)]
    Service(#[from] StorageServiceError),

    #[error(transparent)]
    PartialBatch(#[from] PartialBatchError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } | Error::Validation { context, .. } => {
                Some(context)
            }
            _ => None,
        }
    }
}

/// A decoded error response from the storage service.
///
/// Produced whenever a completed HTTP exchange carries a service-level failure
/// signal, e.g. a batch top-level response with a status other than 202. The
/// error code follows the standard service contract: the `x-ms-error-code`
/// header when present, otherwise the code embedded in the JSON error body.
#[derive(Debug, Clone, Error)]
#[error("Storage service error: HTTP {status}{}: {message}", .error_code.as_ref().map(|c| format!(" ({})", c)).unwrap_or_default())]
pub struct StorageServiceError {
    pub status: u16,
    pub error_code: Option<String>,
    pub message: String,
}

/// A batch whose top-level exchange succeeded (202) but at least one
/// sub-operation failed.
///
/// Carries the complete ordered part list, successes included, so callers can
/// inspect exactly which sub-operations failed without losing the others.
/// Distinct from [`StorageServiceError`]: that one means the exchange itself
/// failed and no parts were ever parsed.
#[derive(Debug, Clone, Error)]
#[error("Partial failure in batch operation: {} of {} sub-requests failed", .parts.iter().filter(|p| !p.is_success()).count(), .parts.len())]
pub struct PartialBatchError {
    /// The triggering top-level response (status always 202 by construction).
    /// Kept whole: its headers (`x-ms-request-id`, ...) and raw body remain
    /// available for correlation and diagnostics.
    pub response: StorageResponse,
    /// All parts in submission order, successes and failures alike.
    pub parts: Vec<PartResponse>,
}

impl PartialBatchError {
    /// Status of the top-level exchange that produced the parts.
    pub fn status(&self) -> u16 {
        self.response.status
    }

    /// Iterate over the failing parts only.
    pub fn failures(&self) -> impl Iterator<Item = &PartResponse> {
        self.parts.iter().filter(|p| !p.is_success())
    }
}
