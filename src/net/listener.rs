//! TCP listener implementation.
//!
//! # Responsibilities
//! - Bind to the configured host and port
//! - Accept incoming TCP connections
//! - Apply per-socket options (TCP_NODELAY)

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(std::io::Error),
}

/// Which kind of traffic a listener carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scheme::Http => write!(f, "http"),
            Scheme::Https => write!(f, "https"),
        }
    }
}

/// A bound TCP listener for one scheme.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    scheme: Scheme,
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind to `host:port`. The host may be a name or an address.
    pub async fn bind(host: &str, port: u16, scheme: Scheme) -> Result<Self, ListenerError> {
        let address = format!("{host}:{port}");
        let bind_err = |source| ListenerError::Bind {
            address: address.clone(),
            source,
        };

        let inner = TcpListener::bind((host, port)).await.map_err(bind_err)?;
        let local_addr = inner.local_addr().map_err(bind_err)?;

        tracing::info!(
            address = %local_addr,
            scheme = %scheme,
            "Listener bound"
        );

        Ok(Self {
            inner,
            scheme,
            local_addr,
        })
    }

    /// Accept a new connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(peer_addr = %addr, error = %e, "Failed to set TCP_NODELAY");
        }

        tracing::debug!(
            peer_addr = %addr,
            scheme = %self.scheme,
            "Connection accepted"
        );

        Ok((stream, addr))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }
}
