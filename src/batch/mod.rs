//! Batch execution: many independent sub-requests in one multipart exchange.
//!
//! A batch is encoded as a single `POST .../?comp=batch` request whose
//! multipart/mixed body carries each sub-request framed as
//! `application/http`. Sub-requests pass only through the reduced policy
//! subset (headers, then credential); the top-level request goes through the
//! full pipeline like any other call. The multipart response is parsed back
//! into [`PartResponse`]s whose count and order always match the submitted
//! sub-requests.

mod parts;

pub use parts::{BatchParts, PartResponse};

use crate::constants::BATCH_BOUNDARY_PREFIX;
use crate::http::{Headers, Method, StorageRequest};
use bytes::{BufMut, Bytes, BytesMut};
use url::Url;

/// One independent sub-operation of a batch. Never sent on its own wire
/// connection; only ever serialized into the multipart body.
#[derive(Debug, Clone)]
pub struct SubRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Headers,
    pub body: Bytes,
}

impl SubRequest {
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

    pub(crate) fn into_request(self) -> StorageRequest {
        StorageRequest {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: self.body,
        }
    }
}

/// Top-level addressing of a batch exchange.
///
/// `path` and `restype` select the batch scope (service-level batches omit
/// `restype`); `sas` is a pre-signed token appended verbatim; `timeout` is the
/// service-side timeout in seconds. `comp=batch` is always present.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub path: String,
    pub restype: Option<String>,
    pub sas: Option<String>,
    pub timeout_secs: Option<u32>,
}

impl BatchOptions {
    pub(crate) fn query(&self) -> String {
        let mut query = String::new();
        if let Some(restype) = &self.restype {
            query.push_str("restype=");
            query.push_str(restype);
            query.push('&');
        }
        query.push_str("comp=batch");
        if let Some(sas) = &self.sas {
            query.push('&');
            query.push_str(sas.trim_start_matches(['?', '&']));
        }
        if let Some(timeout) = self.timeout_secs {
            query.push_str(&format!("&timeout={}", timeout));
        }
        query
    }
}

/// Fresh multipart boundary for one batch exchange.
pub(crate) fn new_boundary() -> String {
    format!("{}{}", BATCH_BOUNDARY_PREFIX, uuid::Uuid::new_v4())
}

/// Serialize prepared sub-requests into a multipart/mixed body.
///
/// Each part is framed per the wire contract: `Content-Type:
/// application/http`, `Content-Transfer-Encoding: binary`, a `Content-ID`
/// carrying the submission index, then the serialized HTTP request.
pub(crate) fn encode_parts(boundary: &str, requests: &[StorageRequest]) -> Bytes {
    let mut buf = BytesMut::new();
    for (index, request) in requests.iter().enumerate() {
        buf.put_slice(format!("--{}\r\n", boundary).as_bytes());
        buf.put_slice(b"Content-Type: application/http\r\n");
        buf.put_slice(b"Content-Transfer-Encoding: binary\r\n");
        buf.put_slice(format!("Content-ID: {}\r\n", index).as_bytes());
        buf.put_slice(b"\r\n");

        buf.put_slice(
            format!("{} {} HTTP/1.1\r\n", request.method, request.path_and_query()).as_bytes(),
        );
        for (name, value) in request.headers.iter() {
            buf.put_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }
        buf.put_slice(b"\r\n");
        if !request.body.is_empty() {
            buf.put_slice(&request.body);
        }
        buf.put_slice(b"\r\n");
    }
    buf.put_slice(format!("--{}--\r\n", boundary).as_bytes());
    buf.freeze()
}
