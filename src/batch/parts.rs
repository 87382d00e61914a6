//! Multipart response parsing.

use crate::http::Headers;
use crate::{Error, ErrorContext, Result};
use bytes::Bytes;

/// One sub-response of a batch, at its original submission index.
#[derive(Debug, Clone)]
pub struct PartResponse {
    /// Index of the matching sub-request in submission order.
    pub index: usize,
    pub status: u16,
    pub reason: String,
    pub headers: Headers,
    pub body: Bytes,
}

impl PartResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Finite, forward-only, non-restartable sequence of [`PartResponse`].
///
/// Parsing is demand-driven: each call to [`Iterator::next`] decodes one part
/// from the buffered multipart body. The sequence is single-use; once a
/// caller begins consuming it, it must finish or abandon it before issuing
/// another operation on the same response. Abandoning it mid-way and reusing
/// the connection is unsupported, and it is not safe to consume from two
/// concurrent tasks.
#[derive(Debug)]
pub struct BatchParts {
    buf: Bytes,
    delimiter: Vec<u8>,
    pos: usize,
    next_index: usize,
    finished: bool,
}

impl BatchParts {
    /// Start parsing a multipart body with the boundary announced in the
    /// top-level `Content-Type`.
    pub(crate) fn new(buf: Bytes, boundary: &str) -> Result<Self> {
        let delimiter = format!("--{}", boundary).into_bytes();
        let start = find(&buf, &delimiter, 0).ok_or_else(|| malformed("opening boundary not found"))?;
        let mut parts = Self {
            pos: start + delimiter.len(),
            buf,
            delimiter,
            next_index: 0,
            finished: false,
        };
        parts.consume_delimiter_tail()?;
        Ok(parts)
    }

    /// After a delimiter: `--` means the terminal boundary, otherwise a CRLF
    /// introduces the next part.
    fn consume_delimiter_tail(&mut self) -> Result<()> {
        if self.buf[self.pos..].starts_with(b"--") {
            self.finished = true;
            return Ok(());
        }
        if self.buf[self.pos..].starts_with(b"\r\n") {
            self.pos += 2;
            return Ok(());
        }
        Err(malformed("unexpected bytes after boundary"))
    }

    fn parse_section(&mut self, section: &[u8]) -> Result<PartResponse> {
        // MIME headers for the part itself (Content-Type: application/http,
        // Content-ID, ...), then the embedded HTTP response.
        let mime_end = find(section, b"\r\n\r\n", 0)
            .ok_or_else(|| malformed("part is missing its MIME header block"))?;
        let mime_headers = parse_headers(&section[..mime_end])?;
        let index = mime_headers
            .get("Content-ID")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(self.next_index);

        let http = &section[mime_end + 4..];
        let status_end = find(http, b"\r\n", 0)
            .ok_or_else(|| malformed("part is missing its HTTP status line"))?;
        let (status, reason) = parse_status_line(&http[..status_end])?;

        let rest = &http[status_end + 2..];
        let (headers, body) = match find(rest, b"\r\n\r\n", 0) {
            Some(headers_end) => (
                parse_headers(&rest[..headers_end])?,
                Bytes::copy_from_slice(&rest[headers_end + 4..]),
            ),
            // A bodiless part may end right after its headers.
            None => (parse_headers(rest)?, Bytes::new()),
        };

        Ok(PartResponse {
            index,
            status,
            reason,
            headers,
            body,
        })
    }
}

impl Iterator for BatchParts {
    type Item = Result<PartResponse>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        // The section runs until the CRLF preceding the next delimiter.
        let mut marker = b"\r\n".to_vec();
        marker.extend_from_slice(&self.delimiter);
        let end = match find(&self.buf, &marker, self.pos) {
            Some(end) => end,
            None => {
                self.finished = true;
                return Some(Err(malformed("closing boundary not found")));
            }
        };

        let section = self.buf.slice(self.pos..end);
        self.pos = end + marker.len();
        if let Err(e) = self.consume_delimiter_tail() {
            self.finished = true;
            return Some(Err(e));
        }

        let part = self.parse_section(&section);
        if part.is_ok() {
            self.next_index += 1;
        }
        Some(part)
    }
}

fn malformed(details: &str) -> Error {
    Error::validation_with_context(
        "malformed multipart batch response",
        ErrorContext::new()
            .with_details(details.to_string())
            .with_source("batch_parts"),
    )
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn parse_headers(block: &[u8]) -> Result<Headers> {
    let mut headers = Headers::new();
    if block.is_empty() {
        return Ok(headers);
    }
    let text = std::str::from_utf8(block).map_err(|_| malformed("non-utf8 header block"))?;
    for line in text.split("\r\n").filter(|l| !l.is_empty()) {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| malformed("header line without separator"))?;
        headers.insert(name.trim(), value.trim());
    }
    Ok(headers)
}

fn parse_status_line(line: &[u8]) -> Result<(u16, String)> {
    let text = std::str::from_utf8(line).map_err(|_| malformed("non-utf8 status line"))?;
    let mut pieces = text.splitn(3, ' ');
    let version = pieces.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(malformed("status line does not start with HTTP version"));
    }
    let status = pieces
        .next()
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| malformed("status line has no numeric status"))?;
    let reason = pieces.next().unwrap_or_default().to_string();
    Ok((status, reason))
}
