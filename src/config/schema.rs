//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway
//! and for the authentication client. All types derive Serde traits for
//! deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default number of accept threads.
pub const DEFAULT_ACCEPT_WORKERS: usize = 2;
/// Default number of request worker threads.
pub const DEFAULT_REQUEST_WORKERS: usize = 6;
/// Default maximum aggregated request size (4MB).
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 4 * 1024 * 1024;
/// Default maximum body chunk size.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 65536;
/// Default maximum request line length.
pub const DEFAULT_MAX_INITIAL_LINE_LENGTH: usize = 4096;
/// Default maximum header block size.
pub const DEFAULT_MAX_HEADER_SIZE: usize = 8192;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (host, ports, TLS).
    pub listener: ListenerConfig,

    /// Accept and request worker pool sizes.
    pub workers: WorkerConfig,

    /// Framing and aggregation limits.
    pub limits: LimitsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
///
/// A port of zero disables that listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host or address to bind (e.g., "0.0.0.0", "localhost").
    pub host: String,

    /// Plaintext HTTP port.
    pub http_port: u16,

    /// HTTPS port. Requires `tls`.
    pub https_port: u16,

    /// TLS material for the HTTPS listener.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            http_port: 8080,
            https_port: 0,
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate chain file (PEM).
    pub cert_path: PathBuf,

    /// Path to private key file (PEM).
    pub key_path: PathBuf,
}

/// Worker pool sizes. Zero selects the default.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Threads running accept loops.
    pub accept_workers: usize,

    /// Threads running connection pipelines and services.
    pub request_workers: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            accept_workers: DEFAULT_ACCEPT_WORKERS,
            request_workers: DEFAULT_REQUEST_WORKERS,
        }
    }
}

impl WorkerConfig {
    pub fn accept_workers(&self) -> usize {
        non_zero_or(self.accept_workers, DEFAULT_ACCEPT_WORKERS)
    }

    pub fn request_workers(&self) -> usize {
        non_zero_or(self.request_workers, DEFAULT_REQUEST_WORKERS)
    }
}

/// Request framing limits. Zero selects the default.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum aggregated body size in bytes.
    pub max_request_size: usize,

    /// Maximum size of a single body chunk in bytes.
    pub max_chunk_size: usize,

    /// Maximum request line length in bytes.
    pub max_initial_line_length: usize,

    /// Maximum header block size in bytes.
    pub max_header_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            max_initial_line_length: DEFAULT_MAX_INITIAL_LINE_LENGTH,
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Seconds without readable bytes before an idle connection is closed.
    /// Zero disables the idle timeout.
    pub idle_read_secs: u64,

    /// Seconds to wait for in-flight connections during shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            idle_read_secs: 0,
            shutdown_grace_secs: 30,
        }
    }
}

impl TimeoutConfig {
    pub fn idle_read(&self) -> Option<Duration> {
        (self.idle_read_secs > 0).then(|| Duration::from_secs(self.idle_read_secs))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Authentication client configuration.
///
/// Without a password the client talks plaintext HTTP and never logs in.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Target gateway host.
    pub host: String,

    /// Target gateway port.
    pub port: u16,

    /// PEM file holding the certificates trusted for the secured gateway.
    pub trust_store: PathBuf,

    /// Login user name.
    pub user: String,

    /// Login password.
    pub password: Option<String>,

    /// Path of the login exchange.
    pub login_path: String,

    /// Path of the command exchange.
    pub command_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5001,
            trust_store: PathBuf::from("/tmp/kvroot/security/client.pem"),
            user: "admin".to_string(),
            password: None,
            login_path: "/V0/nosql/admin/login".to_string(),
            command_path: "/V0/nosql/admin/topology".to_string(),
        }
    }
}

impl ClientConfig {
    /// Whether the client targets a secured gateway.
    pub fn is_secured(&self) -> bool {
        self.password.as_deref().is_some_and(|p| !p.is_empty())
    }
}

fn non_zero_or(value: usize, default: usize) -> usize {
    if value == 0 {
        default
    } else {
        value
    }
}

impl LimitsConfig {
    pub fn max_request_size(&self) -> usize {
        non_zero_or(self.max_request_size, DEFAULT_MAX_REQUEST_SIZE)
    }

    pub fn max_chunk_size(&self) -> usize {
        non_zero_or(self.max_chunk_size, DEFAULT_MAX_CHUNK_SIZE)
    }

    pub fn max_initial_line_length(&self) -> usize {
        non_zero_or(self.max_initial_line_length, DEFAULT_MAX_INITIAL_LINE_LENGTH)
    }

    pub fn max_header_size(&self) -> usize {
        non_zero_or(self.max_header_size, DEFAULT_MAX_HEADER_SIZE)
    }
}
