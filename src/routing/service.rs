//! The pluggable backend contract.

use crate::http::{Request, Response};
use crate::net::connection::ConnectionContext;
use crate::observability::tracing::DiagnosticContext;

/// Error a service may return; the dispatcher maps it to `400 Bad Request`.
pub type ServiceError = Box<dyn std::error::Error + Send + Sync>;

/// A backend unit that claims a path namespace and produces responses.
///
/// Services are registered once at startup and shared by every worker, so
/// implementations must be re-entrant.
pub trait Service: Send + Sync {
    /// Returns true if this service handles `path`.
    ///
    /// `path` has its leading `/` stripped. Must be a pure function of the
    /// path: the registry calls it for every request, in registration order.
    fn claims(&self, path: &str) -> bool;

    /// Handle a request routed to this service.
    ///
    /// Runs on a request worker and may block it. Errors and panics are
    /// contained by the dispatcher.
    fn handle_request(
        &self,
        request: Request,
        connection: &ConnectionContext,
        diagnostics: &DiagnosticContext,
    ) -> Result<Response, ServiceError>;
}
