//! Liveness endpoint.
//!
//! Claims `health` (and anything below it) and answers with a small JSON
//! document, so a freshly started gateway can be probed without any other
//! service registered.

use http::{Method, StatusCode};
use serde::Serialize;

use crate::http::{Request, Response};
use crate::net::connection::ConnectionContext;
use crate::observability::tracing::DiagnosticContext;
use crate::routing::{Matcher, PathPrefixMatcher, Service, ServiceError};

/// Name the health service registers under.
pub const HEALTH_SERVICE_NAME: &str = "health";

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug)]
pub struct HealthService {
    matcher: PathPrefixMatcher,
}

impl HealthService {
    pub fn new() -> Self {
        Self {
            matcher: PathPrefixMatcher::new(HEALTH_SERVICE_NAME),
        }
    }
}

impl Default for HealthService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for HealthService {
    fn claims(&self, path: &str) -> bool {
        self.matcher.matches(path)
    }

    fn handle_request(
        &self,
        request: Request,
        _connection: &ConnectionContext,
        diagnostics: &DiagnosticContext,
    ) -> Result<Response, ServiceError> {
        if request.method() != Method::GET && request.method() != Method::HEAD {
            return Ok(Response::new(StatusCode::METHOD_NOT_ALLOWED));
        }

        let body = serde_json::to_vec(&HealthBody {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        })?;
        tracing::debug!(request_id = %diagnostics.id(), "Health probe answered");
        Ok(Response::json(body))
    }
}
