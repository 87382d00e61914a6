//! Protocol constants shared across the transport runtime.

use std::time::Duration;

/// OAuth scope requested for bearer-token authentication against the storage
/// service.
pub const STORAGE_OAUTH_SCOPE: &str = "https://storage.azure.com/.default";

/// Default service API version sent as `x-ms-version` on every request.
pub const DEFAULT_API_VERSION: &str = "2025-01-05";

/// Header carrying the service API version.
pub const HEADER_API_VERSION: &str = "x-ms-version";

/// Header carrying the decoded service error code on failed responses.
pub const HEADER_ERROR_CODE: &str = "x-ms-error-code";

/// Header carrying the caller-side correlation id.
pub const HEADER_CLIENT_REQUEST_ID: &str = "x-ms-client-request-id";

/// Header carrying the request timestamp (RFC 1123).
pub const HEADER_DATE: &str = "x-ms-date";

/// Default connect timeout for the built-in transport.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(20);

/// Default read timeout for the built-in transport.
pub const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Top-level status code of a successful batch exchange. Anything else is a
/// total failure and parts are never inspected.
pub const BATCH_ACCEPTED_STATUS: u16 = 202;

/// Prefix used when generating multipart boundaries for batch requests.
pub const BATCH_BOUNDARY_PREFIX: &str = "batch_";
