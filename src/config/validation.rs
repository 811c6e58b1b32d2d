//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges and listener combinations
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no listener enabled (http_port and https_port are both 0)")]
    NoListener,

    #[error("https_port {0} requires listener.tls")]
    MissingTls(u16),

    #[error("http_port and https_port are both {0}")]
    PortConflict(u16),

    #[error("listener.host must not be empty")]
    EmptyHost,
}

/// Check a gateway configuration for semantic errors.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let listener = &config.listener;

    if listener.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }

    if listener.http_port == 0 && listener.https_port == 0 {
        errors.push(ValidationError::NoListener);
    }

    if listener.https_port != 0 && listener.tls.is_none() {
        errors.push(ValidationError::MissingTls(listener.https_port));
    }

    if listener.http_port != 0 && listener.http_port == listener.https_port {
        errors.push(ValidationError::PortConflict(listener.http_port));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
