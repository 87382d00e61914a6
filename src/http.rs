//! Request/response types flowing through the pipeline.
//!
//! These are deliberately transport-agnostic: policies mutate a
//! [`StorageRequest`] in place and observe an immutable, fully buffered
//! [`StorageResponse`]. The concrete HTTP client only appears at the
//! transport seam.

use bytes::Bytes;
use url::Url;

pub use reqwest::Method;

/// Ordered, case-insensitive header collection.
///
/// Insertion order is preserved so that serialized sub-requests (batch parts)
/// are byte-deterministic for a given input.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a header (name comparison is case-insensitive).
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Insert only if the header is not already present.
    pub fn insert_if_absent(&mut self, name: &str, value: impl Into<String>) {
        if !self.contains(name) {
            self.entries.push((name.to_string(), value.into()));
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A mutable outgoing request as seen by pipeline policies.
#[derive(Debug, Clone)]
pub struct StorageRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Headers,
    pub body: Bytes,
}

impl StorageRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Path plus query, as written on the request line of a serialized
    /// sub-request.
    pub fn path_and_query(&self) -> String {
        match self.url.query() {
            Some(q) => format!("{}?{}", self.url.path(), q),
            None => self.url.path().to_string(),
        }
    }
}

/// A fully buffered response as seen by pipeline policies and callers.
#[derive(Debug, Clone)]
pub struct StorageResponse {
    pub status: u16,
    pub reason: Option<String>,
    pub headers: Headers,
    pub body: Bytes,
}

impl StorageResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Text form of the body, for error decoding and logging.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Per-call state threaded through the policy chain.
///
/// Cloned by the retry policy so every attempt starts from the request as it
/// stood when retry took over; upstream policies run exactly once per send.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request: StorageRequest,
    /// Attach and verify content checksums for this call.
    pub validate_content: bool,
    /// Route reads to the secondary endpoint when one is configured.
    pub use_secondary: bool,
    /// 0-based attempt counter, maintained by the retry policy.
    pub attempt: u32,
}

impl RequestContext {
    pub fn new(request: StorageRequest) -> Self {
        Self {
            request,
            validate_content: false,
            use_secondary: false,
            attempt: 0,
        }
    }
}

/// Per-call options accepted by [`Pipeline::send_with`](crate::pipeline::Pipeline::send_with).
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub validate_content: bool,
    pub use_secondary: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_case_insensitive_and_ordered() {
        let mut h = Headers::new();
        h.insert("Content-Type", "application/json");
        h.insert("x-ms-version", "2025-01-05");
        h.insert("content-type", "application/octet-stream");

        assert_eq!(h.len(), 2);
        assert_eq!(h.get("CONTENT-TYPE"), Some("application/octet-stream"));
        let names: Vec<&str> = h.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Content-Type", "x-ms-version"]);
    }

    #[test]
    fn path_and_query_includes_query() {
        let url = Url::parse("https://account.dfs.core.windows.net/fs/dir/file?comp=batch").unwrap();
        let req = StorageRequest::new(Method::POST, url);
        assert_eq!(req.path_and_query(), "/fs/dir/file?comp=batch");
    }
}
