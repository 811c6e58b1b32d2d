//! TLS configuration and certificate loading.
//!
//! Server side builds a rustls acceptor from PEM certificate/key files;
//! the same PEM loader reads the client's trust store.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use thiserror::Error;
use tokio_rustls::TlsAcceptor;

use crate::config::TlsConfig;
use crate::net::connection::TlsSession;

/// ALPN protocols offered by the secured listener.
pub const ALPN_PROTOCOLS: &[&[u8]] = &[b"http/1.1"];

/// Error type for loading TLS material.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no certificates found in {}", .0.display())]
    NoCertificates(PathBuf),

    #[error("no private key found in {}", .0.display())]
    NoPrivateKey(PathBuf),

    #[error("invalid TLS configuration: {0}")]
    Rustls(#[from] rustls::Error),
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    if !path.exists() {
        return Err(TlsError::NotFound(path.to_path_buf()));
    }
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Load every certificate from a PEM file. An empty file is an error.
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

/// Load the first private key (PKCS#1, PKCS#8 or SEC1) from a PEM file.
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_path_buf()))
}

/// Build the server-side acceptor for the secured listener.
pub fn build_acceptor(config: &TlsConfig) -> Result<TlsAcceptor, TlsError> {
    let certs = load_certs(&config.cert_path)?;
    let key = load_private_key(&config.key_path)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut server_config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    server_config.alpn_protocols = ALPN_PROTOCOLS.iter().map(|p| p.to_vec()).collect();

    tracing::info!(
        cert = %config.cert_path.display(),
        "TLS acceptor configured"
    );
    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

/// Summarize the negotiated session of an accepted TLS stream.
pub fn session_of<S>(stream: &tokio_rustls::server::TlsStream<S>) -> TlsSession {
    let (_, conn) = stream.get_ref();
    TlsSession {
        protocol: conn.protocol_version().map(|v| format!("{v:?}")),
        server_name: conn.server_name().map(str::to_string),
    }
}
