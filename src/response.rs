//! Service error decoding.
//!
//! Maps completed HTTP exchanges with failure statuses into typed
//! [`StorageServiceError`]s using the standard service-error contract: the
//! error code comes from the `x-ms-error-code` header when present, otherwise
//! from the JSON error body (`{"error": {"code", "message"}}`), and the
//! message falls back to the HTTP reason phrase.

use crate::constants::HEADER_ERROR_CODE;
use crate::error::StorageServiceError;
use crate::http::StorageResponse;
use crate::Error;

fn error_code_from_body(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    json.get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn message_from_body(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    json.get("error")
        .and_then(|e| e.get("message"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Decode a failed response into the unified error type.
pub fn process_storage_error(response: &StorageResponse) -> Error {
    let body = response.body_text();
    let error_code = response
        .headers
        .get(HEADER_ERROR_CODE)
        .map(str::to_string)
        .or_else(|| error_code_from_body(&body));
    let message = message_from_body(&body)
        .or_else(|| response.reason.clone())
        .unwrap_or_else(|| format!("operation failed with status {}", response.status));

    Error::Service(StorageServiceError {
        status: response.status,
        error_code,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Headers;
    use bytes::Bytes;

    fn response(status: u16, headers: Headers, body: &str) -> StorageResponse {
        StorageResponse {
            status,
            reason: Some("Internal Server Error".into()),
            headers,
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn error_code_prefers_header_over_body() {
        let mut headers = Headers::new();
        headers.insert(HEADER_ERROR_CODE, "InternalError");
        let err = process_storage_error(&response(
            500,
            headers,
            r#"{"error":{"code":"OtherCode","message":"boom"}}"#,
        ));
        match err {
            Error::Service(e) => {
                assert_eq!(e.status, 500);
                assert_eq!(e.error_code.as_deref(), Some("InternalError"));
                assert_eq!(e.message, "boom");
            }
            other => panic!("expected service error, got {other}"),
        }
    }

    #[test]
    fn falls_back_to_json_body_then_reason() {
        let err = process_storage_error(&response(
            500,
            Headers::new(),
            r#"{"error":{"code":"ContainerNotFound","message":"The specified container does not exist."}}"#,
        ));
        match err {
            Error::Service(e) => {
                assert_eq!(e.error_code.as_deref(), Some("ContainerNotFound"));
                assert!(e.message.contains("does not exist"));
            }
            other => panic!("expected service error, got {other}"),
        }

        let err = process_storage_error(&response(500, Headers::new(), "not json"));
        match err {
            Error::Service(e) => {
                assert!(e.error_code.is_none());
                assert_eq!(e.message, "Internal Server Error");
            }
            other => panic!("expected service error, got {other}"),
        }
    }
}
