//! Assembled request type.
//!
//! # Responsibilities
//! - Hold a fully aggregated request (head + complete body)
//! - Expose routing-relevant information (path) and keep-alive intent
//!
//! # Design Decisions
//! - Immutable once assembled; the dispatcher invocation owns it
//! - Headers use `http::HeaderMap` (case-insensitive names, ordered values)

use std::borrow::Cow;
use std::net::SocketAddr;

use bytes::Bytes;
use http::header::{self, HeaderMap};
use http::{Method, Version};
use percent_encoding::percent_decode_str;

/// Header carrying the original client address set by a fronting proxy.
pub const X_REAL_IP: &str = "x-real-ip";
/// Header carrying the forwarding chain set by fronting proxies.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// A complete, aggregated HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    target: String,
    path: String,
    routable: bool,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
    remote_addr: SocketAddr,
}

/// Request line and headers as produced by the framing stage.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub target: String,
    pub version: Version,
    pub headers: HeaderMap,
}

impl RequestHead {
    /// An HTTP/1.1 client waiting for `100 Continue` before sending the body.
    pub fn expects_continue(&self) -> bool {
        self.version == Version::HTTP_11
            && self
                .headers
                .get(header::EXPECT)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("100-continue"))
    }
}

impl Request {
    /// Assemble a request from a decoded head and its complete body.
    pub fn from_parts(head: RequestHead, body: Bytes, remote_addr: SocketAddr) -> Self {
        let raw = path_of(&head.target);
        let (path, routable) = match decode_path(raw) {
            Some(decoded) => (decoded.into_owned(), true),
            None => (raw.to_string(), false),
        };
        Self {
            method: head.method,
            target: head.target,
            path,
            routable,
            version: head.version,
            headers: head.headers,
            body,
            remote_addr,
        }
    }

    /// Convenience constructor, mostly for services and tests.
    pub fn builder(method: Method, target: impl Into<String>) -> RequestBuilder {
        RequestBuilder {
            head: RequestHead {
                method,
                target: target.into(),
                version: Version::HTTP_11,
                headers: HeaderMap::new(),
            },
            body: Bytes::new(),
            remote_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The raw request target from the request line.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The percent-decoded path component of the request target, without
    /// query or fragment. Left encoded when [`is_routable`](Self::is_routable)
    /// is false.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// False when the path holds a malformed `%` escape; such requests are
    /// never offered to services.
    pub fn is_routable(&self) -> bool {
        self.routable
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header as a string, if present and valid UTF-8.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Whether the client asked for a persistent connection.
    ///
    /// HTTP/1.1 is persistent unless `Connection: close`; HTTP/1.0 only with
    /// `Connection: keep-alive`.
    pub fn is_keep_alive(&self) -> bool {
        let mut close = false;
        let mut keep_alive = false;
        for value in self.headers.get_all(header::CONNECTION) {
            let Ok(value) = value.to_str() else { continue };
            for token in value.split(',').map(str::trim) {
                if token.eq_ignore_ascii_case("close") {
                    close = true;
                } else if token.eq_ignore_ascii_case("keep-alive") {
                    keep_alive = true;
                }
            }
        }

        if close {
            return false;
        }
        match self.version {
            Version::HTTP_10 | Version::HTTP_09 => keep_alive,
            _ => true,
        }
    }
}

/// Builder for [`Request`].
#[derive(Debug)]
pub struct RequestBuilder {
    head: RequestHead,
    body: Bytes,
    remote_addr: SocketAddr,
}

impl RequestBuilder {
    pub fn version(mut self, version: Version) -> Self {
        self.head.version = version;
        self
    }

    /// Append a header. Invalid names or values are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            header::HeaderName::from_bytes(name.as_bytes()),
            header::HeaderValue::from_str(value),
        ) {
            self.head.headers.append(name, value);
        }
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = addr;
        self
    }

    pub fn build(self) -> Request {
        Request::from_parts(self.head, self.body, self.remote_addr)
    }
}

/// Extract the path component of a request target.
///
/// Handles origin-form (`/a/b?q`) and absolute-form (`http://h/a/b`) targets.
pub fn path_of(target: &str) -> &str {
    let rest = match target.find("://") {
        Some(scheme_end) => {
            let after = &target[scheme_end + 3..];
            match after.find('/') {
                Some(slash) => &after[slash..],
                None => "/",
            }
        }
        None => target,
    };
    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    &rest[..end]
}

/// Percent-decode a path. `None` when a `%` is not followed by two hex
/// digits. Decoded bytes that are not UTF-8 become U+FFFD.
pub fn decode_path(path: &str) -> Option<Cow<'_, str>> {
    let bytes = path.as_bytes();
    let mut from = 0;
    while let Some(pos) = bytes[from..].iter().position(|&b| b == b'%') {
        let at = from + pos;
        let escape = bytes.get(at + 1..at + 3)?;
        if !escape.iter().all(u8::is_ascii_hexdigit) {
            return None;
        }
        from = at + 3;
    }
    Some(percent_decode_str(path).decode_utf8_lossy())
}
