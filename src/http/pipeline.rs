//! Per-connection processing pipeline.
//!
//! # Data Flow
//! ```text
//! accepted TcpStream
//!     → TlsStage        (secured listeners only)
//!     → IdleTimeoutStage (bounds every read)
//!     → FramingStage    (bytes → head / data / end frames)
//!     → AggregationStage (frames → one complete Request)
//!     → Dispatcher      (Request → Response)
//!     → encoded response written back, connection kept or closed
//! ```
//!
//! # Design Decisions
//! - Stages are explicit values in a fixed order; there is no dynamic
//!   handler chain
//! - Requests on one connection are handled strictly in sequence
//! - Protocol errors answer with a bare status and close the connection
//! - `Expect: 100-continue` is answered once the head passes the size check
//! - Responses to `HEAD` carry the headers only

use std::io;
use std::time::Duration;

use bytes::BytesMut;
use http::Method;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

use crate::http::aggregate::{AggregationStage, PayloadTooLarge};
use crate::http::codec::{Frame, FramingError, FramingStage};
use crate::http::dispatcher::Dispatcher;
use crate::http::{Request, Response};
use crate::lifecycle::ShutdownSignal;
use crate::net::connection::ConnectionContext;
use crate::net::tls;
use crate::observability::metrics;
use crate::security::{apply_required_headers, FramingLimits};

/// Initial read buffer reservation per connection.
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// How long to keep draining client bytes after an error response.
const LINGER: Duration = Duration::from_millis(500);

/// Interim response for clients sending `Expect: 100-continue`.
const CONTINUE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

/// Errors that end a connection.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("TLS handshake failed: {0}")]
    Handshake(io::Error),

    #[error("no bytes received for {0:?}")]
    IdleTimeout(Duration),

    #[error(transparent)]
    Framing(#[from] FramingError),

    #[error(transparent)]
    PayloadTooLarge(#[from] PayloadTooLarge),

    #[error("connection closed in the middle of a request")]
    UnexpectedEof,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// TLS stage: performs the server handshake on a raw socket.
#[derive(Clone)]
pub struct TlsStage {
    acceptor: TlsAcceptor,
}

impl TlsStage {
    pub fn new(acceptor: TlsAcceptor) -> Self {
        Self { acceptor }
    }

    pub async fn handshake(
        &self,
        stream: TcpStream,
        idle: IdleTimeoutStage,
    ) -> Result<TlsStream<TcpStream>, PipelineError> {
        let accept = self.acceptor.accept(stream);
        match idle.timeout {
            Some(limit) => tokio::time::timeout(limit, accept)
                .await
                .map_err(|_| PipelineError::IdleTimeout(limit))?
                .map_err(PipelineError::Handshake),
            None => accept.await.map_err(PipelineError::Handshake),
        }
    }
}

/// Idle-timeout stage: fails a read that sees no bytes within the limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleTimeoutStage {
    timeout: Option<Duration>,
}

impl IdleTimeoutStage {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub async fn read<R>(&self, reader: &mut R, buf: &mut BytesMut) -> Result<usize, PipelineError>
    where
        R: AsyncRead + Unpin,
    {
        buf.reserve(READ_BUFFER_SIZE);
        match self.timeout {
            Some(limit) => Ok(tokio::time::timeout(limit, reader.read_buf(buf))
                .await
                .map_err(|_| PipelineError::IdleTimeout(limit))??),
            None => Ok(reader.read_buf(buf).await?),
        }
    }
}

/// The ordered stage chain shared by every connection of one listener.
#[derive(Clone)]
pub struct Pipeline {
    tls: Option<TlsStage>,
    idle: IdleTimeoutStage,
    limits: FramingLimits,
}

impl Pipeline {
    /// Pipeline for a plaintext listener.
    pub fn plain(limits: FramingLimits, idle_timeout: Option<Duration>) -> Self {
        Self {
            tls: None,
            idle: IdleTimeoutStage::new(idle_timeout),
            limits,
        }
    }

    /// Pipeline for a secured listener.
    pub fn secured(
        acceptor: TlsAcceptor,
        limits: FramingLimits,
        idle_timeout: Option<Duration>,
    ) -> Self {
        Self {
            tls: Some(TlsStage::new(acceptor)),
            ..Self::plain(limits, idle_timeout)
        }
    }

    /// Run one accepted socket through the pipeline until it closes.
    pub async fn run(
        &self,
        stream: TcpStream,
        connection: ConnectionContext,
        dispatcher: &Dispatcher,
        shutdown: ShutdownSignal,
    ) {
        match &self.tls {
            Some(stage) => match stage.handshake(stream, self.idle).await {
                Ok(stream) => {
                    let connection = connection.with_tls(tls::session_of(&stream));
                    self.serve(stream, connection, dispatcher, shutdown).await;
                }
                Err(e) => {
                    tracing::info!(
                        connection_id = %connection.id(),
                        peer_addr = %connection.peer_addr(),
                        error = %e,
                        "TLS handshake failed, closing"
                    );
                }
            },
            None => self.serve(stream, connection, dispatcher, shutdown).await,
        }
    }

    /// Serve requests from an established byte stream.
    pub async fn serve<S>(
        &self,
        stream: S,
        connection: ConnectionContext,
        dispatcher: &Dispatcher,
        mut shutdown: ShutdownSignal,
    ) where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut conn = ConnectionState::new(stream, self.limits, self.idle, connection.peer_addr());

        loop {
            let next = if conn.is_idle() {
                tokio::select! {
                    next = conn.next_request() => next,
                    _ = shutdown.recv() => {
                        tracing::debug!(
                            connection_id = %connection.id(),
                            "Closing idle connection for shutdown"
                        );
                        break;
                    }
                }
            } else {
                conn.next_request().await
            };

            match next {
                Ok(Some(request)) => {
                    let head_only = request.method() == Method::HEAD;
                    let response = dispatcher.handle(request, &connection);
                    let keep_alive = response.is_keep_alive();
                    if let Err(e) = conn.write_response(&response, head_only).await {
                        tracing::info!(
                            connection_id = %connection.id(),
                            error = %e,
                            "Failed to write response, closing"
                        );
                        break;
                    }
                    if !keep_alive {
                        conn.close().await;
                        break;
                    }
                    if shutdown.is_triggered() {
                        break;
                    }
                }
                Ok(None) => {
                    tracing::debug!(connection_id = %connection.id(), "Connection closed by peer");
                    break;
                }
                Err(PipelineError::Framing(e)) => {
                    metrics::record_protocol_error(e.kind());
                    tracing::info!(
                        connection_id = %connection.id(),
                        peer_addr = %connection.peer_addr(),
                        error = %e,
                        "Malformed request, closing"
                    );
                    conn.reject(Response::bad_request()).await;
                    break;
                }
                Err(PipelineError::PayloadTooLarge(e)) => {
                    metrics::record_protocol_error("payload_too_large");
                    tracing::info!(
                        connection_id = %connection.id(),
                        peer_addr = %connection.peer_addr(),
                        limit = e.limit,
                        "Request body too large, closing"
                    );
                    conn.reject(Response::payload_too_large()).await;
                    break;
                }
                Err(PipelineError::IdleTimeout(limit)) => {
                    tracing::debug!(
                        connection_id = %connection.id(),
                        timeout = ?limit,
                        "Idle connection timed out, closing"
                    );
                    break;
                }
                Err(e) => {
                    tracing::info!(
                        connection_id = %connection.id(),
                        error = %e,
                        "Connection failed, closing"
                    );
                    break;
                }
            }
        }
    }
}

/// Mutable per-connection state: the stream plus the framing and
/// aggregation stages and their shared read buffer.
struct ConnectionState<S> {
    stream: S,
    buf: BytesMut,
    idle: IdleTimeoutStage,
    framing: FramingStage,
    aggregation: AggregationStage,
    peer: std::net::SocketAddr,
}

impl<S> ConnectionState<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn new(
        stream: S,
        limits: FramingLimits,
        idle: IdleTimeoutStage,
        peer: std::net::SocketAddr,
    ) -> Self {
        Self {
            stream,
            buf: BytesMut::with_capacity(READ_BUFFER_SIZE),
            idle,
            framing: FramingStage::new(limits),
            aggregation: AggregationStage::new(limits.max_request_size),
            peer,
        }
    }

    /// No request bytes are buffered or partially assembled.
    fn is_idle(&self) -> bool {
        self.buf.is_empty() && self.framing.is_idle() && self.aggregation.is_idle()
    }

    /// Read until one complete request is assembled.
    ///
    /// Returns `Ok(None)` when the peer closes cleanly between requests.
    async fn next_request(&mut self) -> Result<Option<Request>, PipelineError> {
        loop {
            while let Some(frame) = self.framing.decode(&mut self.buf)? {
                let expects_continue =
                    matches!(&frame, Frame::Head(head) if head.expects_continue());
                if let Some(request) = self.aggregation.accept(frame, self.peer)? {
                    return Ok(Some(request));
                }
                if expects_continue {
                    self.stream.write_all(CONTINUE).await?;
                    self.stream.flush().await?;
                }
            }

            if self.idle.read(&mut self.stream, &mut self.buf).await? == 0 {
                return if self.is_idle() {
                    Ok(None)
                } else {
                    Err(PipelineError::UnexpectedEof)
                };
            }
        }
    }

    async fn write_response(&mut self, response: &Response, head_only: bool) -> io::Result<()> {
        let wire = if head_only {
            response.encode_head()
        } else {
            response.encode()
        };
        self.stream.write_all(&wire).await?;
        self.stream.flush().await
    }

    /// Answer a protocol error and close.
    async fn reject(&mut self, mut response: Response) {
        apply_required_headers(&mut response);
        response.set_keep_alive(false);
        if self.write_response(&response, false).await.is_ok() {
            self.close().await;
        }
    }

    /// Half-close, then discard whatever the client still sends for a short
    /// while so unread bytes do not turn the close into a reset.
    async fn close(&mut self) {
        if self.stream.shutdown().await.is_err() {
            return;
        }
        let mut scratch = [0u8; 4096];
        let drain = async {
            while let Ok(n) = self.stream.read(&mut scratch).await {
                if n == 0 {
                    break;
                }
            }
        };
        let _ = tokio::time::timeout(LINGER, drain).await;
    }
}
