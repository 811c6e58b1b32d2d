//! HTTP/1.1 request framing.
//!
//! Incremental decoder that turns a byte buffer into [`Frame`]s: one `Head`,
//! zero or more `Data` frames, then `End`. Bodies are framed by
//! Content-Length or chunked transfer coding.
//!
//! # Design Decisions
//! - Request line and header block are bounded before parsing
//! - Declared chunk sizes above the limit are rejected, never split
//! - Content-Length bodies are emitted in pieces no larger than the chunk limit
//! - Content-Length together with Transfer-Encoding is rejected

use bytes::{Buf, Bytes, BytesMut};
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{Method, Version};
use thiserror::Error;

use crate::http::request::RequestHead;
use crate::security::FramingLimits;

/// Upper bound on headers parsed per request.
const MAX_HEADERS: usize = 128;

/// Upper bound on a chunk-size line, extensions included.
const MAX_CHUNK_LINE: usize = 1024;

/// Output of the framing stage.
#[derive(Debug)]
pub enum Frame {
    Head(RequestHead),
    Data(Bytes),
    End,
}

/// A framing violation. Every variant maps to `400 Bad Request`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    #[error("request line exceeds {limit} bytes")]
    InitialLineTooLong { limit: usize },

    #[error("header block exceeds {limit} bytes")]
    HeaderTooLarge { limit: usize },

    #[error("chunk of {size} bytes exceeds {limit} bytes")]
    ChunkTooLarge { size: u64, limit: usize },

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("invalid chunk size line")]
    InvalidChunkSize,

    #[error("invalid content-length")]
    InvalidContentLength,

    #[error("both content-length and transfer-encoding present")]
    ConflictingLength,

    #[error("unsupported transfer-encoding")]
    UnsupportedTransferEncoding,
}

impl FramingError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FramingError::InitialLineTooLong { .. } => "initial_line_too_long",
            FramingError::HeaderTooLarge { .. } => "header_too_large",
            FramingError::ChunkTooLarge { .. } => "chunk_too_large",
            FramingError::Malformed(_) => "malformed",
            FramingError::InvalidChunkSize => "invalid_chunk_size",
            FramingError::InvalidContentLength => "invalid_content_length",
            FramingError::ConflictingLength => "conflicting_length",
            FramingError::UnsupportedTransferEncoding => "unsupported_transfer_encoding",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Head,
    Fixed { remaining: u64 },
    ChunkSize,
    ChunkData { remaining: u64 },
    ChunkDataEnd,
    Trailers { consumed: usize },
}

/// Framing stage: decodes request heads and bodies from a read buffer.
#[derive(Debug)]
pub struct FramingStage {
    limits: FramingLimits,
    state: State,
}

impl FramingStage {
    pub fn new(limits: FramingLimits) -> Self {
        Self {
            limits,
            state: State::Head,
        }
    }

    /// True between messages, i.e. no partially decoded request is pending.
    pub fn is_idle(&self) -> bool {
        self.state == State::Head
    }

    /// Decode the next frame from `buf`, consuming its bytes.
    ///
    /// Returns `Ok(None)` when more input is needed.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, FramingError> {
        loop {
            match self.state {
                State::Head => return self.decode_head(buf),
                State::Fixed { remaining } => {
                    if remaining == 0 {
                        self.state = State::Head;
                        return Ok(Some(Frame::End));
                    }
                    let Some(data) = self.take_data(buf, remaining) else {
                        return Ok(None);
                    };
                    self.state = State::Fixed {
                        remaining: remaining - data.len() as u64,
                    };
                    return Ok(Some(Frame::Data(data)));
                }
                State::ChunkSize => {
                    let Some(line_end) = find(buf, b"\r\n") else {
                        if buf.len() > MAX_CHUNK_LINE {
                            return Err(FramingError::InvalidChunkSize);
                        }
                        return Ok(None);
                    };
                    let size = parse_chunk_size(&buf[..line_end])?;
                    if size > self.limits.max_chunk_size as u64 {
                        return Err(FramingError::ChunkTooLarge {
                            size,
                            limit: self.limits.max_chunk_size,
                        });
                    }
                    buf.advance(line_end + 2);
                    self.state = if size == 0 {
                        State::Trailers { consumed: 0 }
                    } else {
                        State::ChunkData { remaining: size }
                    };
                }
                State::ChunkData { remaining } => {
                    let Some(data) = self.take_data(buf, remaining) else {
                        return Ok(None);
                    };
                    let remaining = remaining - data.len() as u64;
                    self.state = if remaining == 0 {
                        State::ChunkDataEnd
                    } else {
                        State::ChunkData { remaining }
                    };
                    return Ok(Some(Frame::Data(data)));
                }
                State::ChunkDataEnd => {
                    if buf.len() < 2 {
                        return Ok(None);
                    }
                    if &buf[..2] != b"\r\n" {
                        return Err(FramingError::Malformed("missing CRLF after chunk".into()));
                    }
                    buf.advance(2);
                    self.state = State::ChunkSize;
                }
                State::Trailers { consumed } => {
                    let Some(line_end) = find(buf, b"\r\n") else {
                        if consumed + buf.len() > self.limits.max_header_size {
                            return Err(FramingError::HeaderTooLarge {
                                limit: self.limits.max_header_size,
                            });
                        }
                        return Ok(None);
                    };
                    buf.advance(line_end + 2);
                    if line_end == 0 {
                        self.state = State::Head;
                        return Ok(Some(Frame::End));
                    }
                    let consumed = consumed + line_end + 2;
                    if consumed > self.limits.max_header_size {
                        return Err(FramingError::HeaderTooLarge {
                            limit: self.limits.max_header_size,
                        });
                    }
                    self.state = State::Trailers { consumed };
                }
            }
        }
    }

    fn take_data(&self, buf: &mut BytesMut, remaining: u64) -> Option<Bytes> {
        if buf.is_empty() {
            return None;
        }
        let n = (remaining.min(self.limits.max_chunk_size as u64) as usize).min(buf.len());
        Some(buf.split_to(n).freeze())
    }

    fn decode_head(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, FramingError> {
        // Tolerate stray CRLFs between messages.
        while buf.starts_with(b"\r\n") {
            buf.advance(2);
        }

        let max_line = self.limits.max_initial_line_length;
        let max_headers = self.limits.max_header_size;

        let line_end = match find(buf, b"\r\n") {
            Some(pos) if pos > max_line => {
                return Err(FramingError::InitialLineTooLong { limit: max_line })
            }
            Some(pos) => pos,
            None if buf.len() > max_line => {
                return Err(FramingError::InitialLineTooLong { limit: max_line })
            }
            None => return Ok(None),
        };

        let header_block = match find(&buf[line_end..], b"\r\n\r\n") {
            Some(len) if len > max_headers => {
                return Err(FramingError::HeaderTooLarge { limit: max_headers })
            }
            Some(len) => len,
            None if buf.len() - line_end > max_headers + 4 => {
                return Err(FramingError::HeaderTooLarge { limit: max_headers })
            }
            None => return Ok(None),
        };
        let head_len = line_end + header_block + 4;

        let head = parse_head(&buf[..head_len])?;
        let body = body_kind(&head.headers)?;
        buf.advance(head_len);

        self.state = match body {
            BodyKind::Chunked => State::ChunkSize,
            BodyKind::Fixed(len) => State::Fixed { remaining: len },
        };
        Ok(Some(Frame::Head(head)))
    }
}

enum BodyKind {
    Fixed(u64),
    Chunked,
}

fn parse_head(bytes: &[u8]) -> Result<RequestHead, FramingError> {
    let mut storage = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Request::new(&mut storage);
    match parsed.parse(bytes) {
        Ok(httparse::Status::Complete(_)) => {}
        Ok(httparse::Status::Partial) => {
            return Err(FramingError::Malformed("incomplete request head".into()))
        }
        Err(e) => return Err(FramingError::Malformed(e.to_string())),
    }

    let method = parsed
        .method
        .ok_or_else(|| FramingError::Malformed("missing method".into()))?;
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| FramingError::Malformed(format!("invalid method {method}")))?;
    let target = parsed
        .path
        .ok_or_else(|| FramingError::Malformed("missing request target".into()))?
        .to_string();
    let version = match parsed.version {
        Some(0) => Version::HTTP_10,
        Some(1) => Version::HTTP_11,
        _ => return Err(FramingError::Malformed("unsupported version".into())),
    };

    let mut headers = HeaderMap::with_capacity(parsed.headers.len());
    for h in parsed.headers.iter() {
        let name = HeaderName::from_bytes(h.name.as_bytes())
            .map_err(|_| FramingError::Malformed(format!("invalid header name {}", h.name)))?;
        let value = HeaderValue::from_bytes(h.value)
            .map_err(|_| FramingError::Malformed(format!("invalid value for {}", h.name)))?;
        headers.append(name, value);
    }

    Ok(RequestHead {
        method,
        target,
        version,
        headers,
    })
}

fn body_kind(headers: &HeaderMap) -> Result<BodyKind, FramingError> {
    let has_length = headers.contains_key(header::CONTENT_LENGTH);

    if headers.contains_key(header::TRANSFER_ENCODING) {
        if has_length {
            return Err(FramingError::ConflictingLength);
        }
        let last = headers
            .get_all(header::TRANSFER_ENCODING)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .last();
        return match last {
            Some(coding) if coding.eq_ignore_ascii_case("chunked") => Ok(BodyKind::Chunked),
            _ => Err(FramingError::UnsupportedTransferEncoding),
        };
    }

    if !has_length {
        return Ok(BodyKind::Fixed(0));
    }

    let mut length: Option<u64> = None;
    for value in headers.get_all(header::CONTENT_LENGTH) {
        let parsed = value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .ok_or(FramingError::InvalidContentLength)?;
        match length {
            Some(existing) if existing != parsed => return Err(FramingError::InvalidContentLength),
            _ => length = Some(parsed),
        }
    }
    Ok(BodyKind::Fixed(length.unwrap_or(0)))
}

fn parse_chunk_size(line: &[u8]) -> Result<u64, FramingError> {
    let line = std::str::from_utf8(line).map_err(|_| FramingError::InvalidChunkSize)?;
    let size = line.split(';').next().unwrap_or("").trim();
    if size.is_empty() || size.len() > 16 {
        return Err(FramingError::InvalidChunkSize);
    }
    u64::from_str_radix(size, 16).map_err(|_| FramingError::InvalidChunkSize)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
