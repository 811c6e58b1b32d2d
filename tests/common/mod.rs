//! Shared utilities for the integration tests.
//!
//! Gateways own their runtimes, so tests drive them from plain `#[test]`
//! functions with blocking sockets. Each test uses its own fixed port.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use service_gateway::config::{GatewayConfig, TlsConfig};
use service_gateway::http::{Gateway, Request, Response};
use service_gateway::net::ConnectionContext;
use service_gateway::observability::DiagnosticContext;
use service_gateway::routing::{
    Matcher, PathPrefixMatcher, Service, ServiceError, ServiceRegistry,
};

pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Gateway config for tests: plaintext only, small pools, short grace.
pub fn test_config(http_port: u16) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.listener.http_port = http_port;
    config.listener.https_port = 0;
    config.workers.accept_workers = 1;
    config.workers.request_workers = 2;
    config.timeouts.shutdown_grace_secs = 2;
    config
}

/// Start a gateway with the given services registered in order.
pub fn start_gateway(config: GatewayConfig, services: Vec<(&str, Arc<dyn Service>)>) -> Gateway {
    let mut registry = ServiceRegistry::new();
    for (name, service) in services {
        registry.register(name, service).unwrap();
    }
    Gateway::start(config, registry).unwrap()
}

/// One request as a service saw it.
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Vec<u8>,
}

type Handler = dyn Fn(&Request) -> Result<Response, ServiceError> + Send + Sync;

/// Service that claims a prefix, records every request and answers through
/// a closure.
pub struct RecordingService {
    matcher: PathPrefixMatcher,
    handler: Box<Handler>,
    seen: Mutex<Vec<Seen>>,
}

impl RecordingService {
    pub fn new<F>(prefix: &str, handler: F) -> Arc<Self>
    where
        F: Fn(&Request) -> Result<Response, ServiceError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            matcher: PathPrefixMatcher::new(prefix),
            handler: Box::new(handler),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Echo the request body back with 200.
    pub fn echo(prefix: &str) -> Arc<Self> {
        Self::new(prefix, |request| {
            Ok(Response::new(http::StatusCode::OK).with_body(request.body().clone()))
        })
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

impl Service for RecordingService {
    fn claims(&self, path: &str) -> bool {
        self.matcher.matches(path)
    }

    fn handle_request(
        &self,
        request: Request,
        _connection: &ConnectionContext,
        _diagnostics: &DiagnosticContext,
    ) -> Result<Response, ServiceError> {
        self.seen.lock().unwrap().push(Seen {
            method: request.method().to_string(),
            path: request.path().to_string(),
            authorization: request.header_str("authorization").map(str::to_string),
            body: request.body().to_vec(),
        });
        (self.handler)(&request)
    }
}

/// A parsed HTTP/1.1 response.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Blocking client connection speaking raw HTTP/1.1.
pub struct RawConnection {
    reader: BufReader<TcpStream>,
}

impl RawConnection {
    pub fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(READ_TIMEOUT)).unwrap();
        Self {
            reader: BufReader::new(stream),
        }
    }

    pub fn send(&mut self, bytes: &[u8]) {
        self.reader.get_mut().write_all(bytes).unwrap();
    }

    /// Read one response framed by its Content-Length.
    pub fn read_response(&mut self) -> RawResponse {
        let mut response = self.read_head();
        let length: usize = response.header("content-length").unwrap().parse().unwrap();
        response.body = vec![0; length];
        self.reader.read_exact(&mut response.body).unwrap();
        response
    }

    /// Read a status line and headers only, as for a `HEAD` answer or an
    /// interim `100 Continue`.
    pub fn read_head(&mut self) -> RawResponse {
        let mut status_line = String::new();
        self.reader.read_line(&mut status_line).unwrap();
        let status = status_line
            .split_whitespace()
            .nth(1)
            .unwrap_or_else(|| panic!("bad status line: {status_line:?}"))
            .parse()
            .unwrap();

        let mut headers = Vec::new();
        loop {
            let mut line = String::new();
            self.reader.read_line(&mut line).unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            let (name, value) = line.split_once(':').unwrap();
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        RawResponse {
            status,
            headers,
            body: Vec::new(),
        }
    }

    /// Send a request and read its response.
    pub fn round_trip(&mut self, bytes: &[u8]) -> RawResponse {
        self.send(bytes);
        self.read_response()
    }

    /// True once the server has closed its side.
    pub fn is_closed_by_server(&mut self) -> bool {
        let mut byte = [0u8; 1];
        matches!(self.reader.read(&mut byte), Ok(0))
    }
}

/// Write a self-signed certificate for localhost and 127.0.0.1 into `dir`.
///
/// Returns the gateway TLS config; the certificate file doubles as the
/// client trust store.
pub fn write_self_signed(dir: &Path) -> TlsConfig {
    let rcgen::CertifiedKey { cert, signing_key } = rcgen::generate_simple_self_signed(vec![
        "localhost".to_string(),
        "127.0.0.1".to_string(),
    ])
    .unwrap();
    let cert_path = dir.join("cert.pem");
    let key_path = dir.join("key.pem");
    std::fs::write(&cert_path, cert.pem()).unwrap();
    std::fs::write(&key_path, signing_key.serialize_pem()).unwrap();
    TlsConfig {
        cert_path,
        key_path,
    }
}
