//! Authentication client for a secured gateway.
//!
//! # State Machine
//! ```text
//! Unauthenticated ──login()──▶ LoggingIn ──token──▶ Authenticated
//!        ▲                         │
//!        └──────── failure ────────┘
//! ```
//!
//! # Design Decisions
//! - The trust store is loaded before the first handshake; a missing or
//!   empty store is a configuration error and is never retried
//! - Login sends basic credentials once; later requests carry only the
//!   bearer token
//! - Without a password the client speaks plain HTTP and never logs in
//! - Server hostnames are verified against the trusted certificates

use std::fmt;

use reqwest::{Certificate, RequestBuilder, StatusCode};
use serde::Serialize;
use thiserror::Error;

use crate::client::token::extract_token;
use crate::config::ClientConfig;
use crate::net::tls::{self, TlsError};

/// Authentication progress of one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    LoggingIn,
    Authenticated,
}

/// Error type for the authentication client.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("trust store unusable: {0}")]
    TrustStore(#[from] TlsError),

    #[error("login response carried no token")]
    MissingToken,

    #[error("login rejected with status {0}")]
    LoginRejected(StatusCode),

    #[error("not authenticated; call login first")]
    NotAuthenticated,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result of a command exchange. The body is passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: StatusCode,
    pub body: String,
}

#[derive(Serialize)]
struct CommandRequest<'a> {
    command: &'a str,
}

/// Client that logs in to a secured gateway and issues commands.
pub struct AuthClient {
    config: ClientConfig,
    http: Option<reqwest::Client>,
    state: AuthState,
    token: Option<String>,
}

impl fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthClient")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl AuthClient {
    /// Create a client. Secured clients build their TLS stack on first login.
    pub fn new(config: ClientConfig) -> Result<Self, AuthError> {
        let http = if config.is_secured() {
            None
        } else {
            Some(reqwest::Client::builder().build()?)
        };
        Ok(Self {
            config,
            http,
            state: AuthState::Unauthenticated,
            token: None,
        })
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn is_secured(&self) -> bool {
        self.config.is_secured()
    }

    /// Scheme, host and port every request is sent to.
    pub fn base_url(&self) -> String {
        let scheme = if self.is_secured() { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.config.host, self.config.port)
    }

    /// Log in with the configured credentials. A no-op for unsecured clients.
    pub async fn login(&mut self) -> Result<(), AuthError> {
        if !self.is_secured() || self.state == AuthState::Authenticated {
            return Ok(());
        }

        self.state = AuthState::LoggingIn;
        match self.exchange_credentials().await {
            Ok(token) => {
                self.token = Some(token);
                self.state = AuthState::Authenticated;
                tracing::info!(
                    host = %self.config.host,
                    user = %self.config.user,
                    "Logged in"
                );
                Ok(())
            }
            Err(e) => {
                self.state = AuthState::Unauthenticated;
                tracing::warn!(
                    host = %self.config.host,
                    user = %self.config.user,
                    error = %e,
                    "Login failed"
                );
                Err(e)
            }
        }
    }

    async fn exchange_credentials(&mut self) -> Result<String, AuthError> {
        let http = self.secured_client()?;
        let url = format!("{}{}", self.base_url(), self.config.login_path);

        let response = http
            .post(url)
            .basic_auth(&self.config.user, self.config.password.as_deref())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::LoginRejected(status));
        }

        let body = response.text().await?;
        extract_token(&body).ok_or(AuthError::MissingToken)
    }

    /// Build the TLS client from the trust store, once.
    fn secured_client(&mut self) -> Result<reqwest::Client, AuthError> {
        if let Some(http) = &self.http {
            return Ok(http.clone());
        }

        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .tls_built_in_root_certs(false);
        for der in tls::load_certs(&self.config.trust_store)? {
            builder = builder.add_root_certificate(Certificate::from_der(der.as_ref())?);
        }
        let http = builder.build()?;
        tracing::debug!(
            trust_store = %self.config.trust_store.display(),
            "Trust store loaded"
        );
        self.http = Some(http.clone());
        Ok(http)
    }

    /// Attach the credential this client currently holds.
    pub fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, AuthError> {
        if !self.is_secured() {
            return Ok(request);
        }
        match (self.state, &self.token) {
            (AuthState::Authenticated, Some(token)) => Ok(request.bearer_auth(token)),
            _ => Err(AuthError::NotAuthenticated),
        }
    }

    /// Send a named command and return the response verbatim.
    pub async fn send_command(&self, command: &str) -> Result<CommandOutput, AuthError> {
        let http = self.http.as_ref().ok_or(AuthError::NotAuthenticated)?;
        let url = format!("{}{}", self.base_url(), self.config.command_path);

        let request = self.authorize(http.post(url).json(&CommandRequest { command }))?;
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(command, status = status.as_u16(), "Command answered");
        Ok(CommandOutput { status, body })
    }
}
