//! Response type and wire serialization.
//!
//! # Responsibilities
//! - Hold a complete response (status, headers, body)
//! - Serialize to HTTP/1.1 bytes for the connection write path
//!
//! # Design Decisions
//! - Content-Length always reflects the body actually sent
//! - Bodies are fully buffered; no chunked responses

use bytes::{BufMut, Bytes, BytesMut};
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;

/// A complete HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// An empty `400 Bad Request`.
    pub fn bad_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST)
    }

    /// An empty `413 Payload Too Large`.
    pub fn payload_too_large() -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE)
    }

    /// A `200 OK` with a JSON body.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK)
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(body)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Whether the connection should stay open after this response.
    pub fn is_keep_alive(&self) -> bool {
        self.headers
            .get(header::CONNECTION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("keep-alive"))
    }

    /// Mark the response for a persistent or closing connection.
    pub fn set_keep_alive(&mut self, keep_alive: bool) {
        let value = if keep_alive { "keep-alive" } else { "close" };
        self.headers
            .insert(header::CONNECTION, HeaderValue::from_static(value));
    }

    /// Serialize as an HTTP/1.1 message.
    pub fn encode(&self) -> BytesMut {
        self.encode_with(true)
    }

    /// Serialize as the answer to a `HEAD` request: the same status line and
    /// headers, Content-Length included, but no body bytes.
    pub fn encode_head(&self) -> BytesMut {
        self.encode_with(false)
    }

    fn encode_with(&self, include_body: bool) -> BytesMut {
        let mut out = BytesMut::with_capacity(128 + self.body.len());
        out.put_slice(b"HTTP/1.1 ");
        out.put_slice(self.status.as_str().as_bytes());
        out.put_u8(b' ');
        out.put_slice(self.status.canonical_reason().unwrap_or("").as_bytes());
        out.put_slice(b"\r\n");

        for (name, value) in &self.headers {
            if name == header::CONTENT_LENGTH || name == header::TRANSFER_ENCODING {
                continue;
            }
            out.put_slice(name.as_str().as_bytes());
            out.put_slice(b": ");
            out.put_slice(value.as_bytes());
            out.put_slice(b"\r\n");
        }
        out.put_slice(format!("content-length: {}\r\n\r\n", self.body.len()).as_bytes());
        if include_body {
            out.put_slice(&self.body);
        }
        out
    }
}
