//! Request aggregation.
//!
//! Consumes framing output and assembles one complete in-memory [`Request`]
//! per message, bounded by the configured maximum request size.

use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use http::header;
use thiserror::Error;

use crate::http::codec::Frame;
use crate::http::request::{Request, RequestHead};

/// The aggregated body would exceed the configured maximum.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("request body exceeds {limit} bytes")]
pub struct PayloadTooLarge {
    pub limit: usize,
}

/// Aggregation stage: frames in, complete requests out.
#[derive(Debug)]
pub struct AggregationStage {
    max_request_size: usize,
    pending: Option<(RequestHead, BytesMut)>,
}

impl AggregationStage {
    pub fn new(max_request_size: usize) -> Self {
        Self {
            max_request_size,
            pending: None,
        }
    }

    /// True when no request is partially assembled.
    pub fn is_idle(&self) -> bool {
        self.pending.is_none()
    }

    /// Feed one frame. Returns the request once its `End` frame arrives.
    pub fn accept(
        &mut self,
        frame: Frame,
        remote_addr: SocketAddr,
    ) -> Result<Option<Request>, PayloadTooLarge> {
        match frame {
            Frame::Head(head) => {
                let declared = declared_length(&head);
                if declared.is_some_and(|len| len > self.max_request_size as u64) {
                    return Err(self.too_large());
                }
                let capacity = declared.unwrap_or(0) as usize;
                self.pending = Some((head, BytesMut::with_capacity(capacity)));
                Ok(None)
            }
            Frame::Data(data) => {
                let limit = self.max_request_size;
                let Some((_, body)) = self.pending.as_mut() else {
                    return Ok(None);
                };
                if body.len() + data.len() > limit {
                    self.pending = None;
                    return Err(PayloadTooLarge { limit });
                }
                body.extend_from_slice(&data);
                Ok(None)
            }
            Frame::End => Ok(self
                .pending
                .take()
                .map(|(head, body)| Request::from_parts(head, Bytes::from(body), remote_addr))),
        }
    }

    fn too_large(&mut self) -> PayloadTooLarge {
        self.pending = None;
        PayloadTooLarge {
            limit: self.max_request_size,
        }
    }
}

fn declared_length(head: &RequestHead) -> Option<u64> {
    head.headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
