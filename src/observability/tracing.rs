//! Per-request diagnostic context.
//!
//! # Responsibilities
//! - Generate a unique id per dispatched request (UUID v4)
//! - Label the request as "<METHOD> <path>"
//! - Provide a span so service logs correlate with the request

use uuid::Uuid;

/// Diagnostic context handed to a service for one request.
#[derive(Debug, Clone)]
pub struct DiagnosticContext {
    id: Uuid,
    label: String,
    span: tracing::Span,
}

impl DiagnosticContext {
    /// Create a fresh context tagged with `label`.
    pub fn new(label: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        let label = label.into();
        let span = tracing::info_span!("request", request_id = %id, op = %label);
        Self {
            id,
            label,
            span,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The "<METHOD> <path>" tag.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }
}
