//! Request dispatch.
//!
//! # Responsibilities
//! - Resolve the service for a request path via the registry
//! - Invoke it with a fresh diagnostic context
//! - Contain service failures (errors and panics) as `400 Bad Request`
//! - Apply security headers and the keep-alive decision to every response
//!
//! # Design Decisions
//! - Stateless and re-entrant: holds only the frozen registry
//! - Keep-alive decided once, from the request; services cannot override it
//! - Forwarding headers are logged for operators, never trusted

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use crate::http::request::{X_FORWARDED_FOR, X_REAL_IP};
use crate::http::{Request, Response};
use crate::net::connection::ConnectionContext;
use crate::observability::metrics;
use crate::observability::tracing::DiagnosticContext;
use crate::routing::ServiceRegistry;
use crate::security::apply_required_headers;

/// Metrics label for requests no service claimed.
const UNMATCHED: &str = "none";

/// Routes assembled requests to registered services.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ServiceRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self { registry }
    }

    /// Handle one request and produce the response to write.
    ///
    /// The response carries `Connection: keep-alive` when the client asked
    /// for a persistent connection and `Connection: close` otherwise.
    pub fn handle(&self, request: Request, connection: &ConnectionContext) -> Response {
        let start = Instant::now();
        let keep_alive = request.is_keep_alive();

        let (mut response, service) = self.route(request, connection);

        apply_required_headers(&mut response);
        response.set_keep_alive(keep_alive);

        metrics::record_request(service, response.status().as_u16(), start);
        response
    }

    fn route(&self, request: Request, connection: &ConnectionContext) -> (Response, &str) {
        let entry = if request.is_routable() {
            self.registry.lookup(request.path())
        } else {
            None
        };
        let Some(entry) = entry else {
            log_unmatched(&request, connection);
            return (Response::bad_request(), UNMATCHED);
        };

        let diagnostics =
            DiagnosticContext::new(format!("{} {}", request.method(), request.path()));
        let service = entry.service();

        let outcome = diagnostics.span().in_scope(|| {
            panic::catch_unwind(AssertUnwindSafe(|| {
                service.handle_request(request, connection, &diagnostics)
            }))
        });

        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!(
                    service = entry.name(),
                    request_id = %diagnostics.id(),
                    op = diagnostics.label(),
                    error = %e,
                    "Service failed to handle request"
                );
                Response::bad_request()
            }
            Err(payload) => {
                tracing::error!(
                    service = entry.name(),
                    request_id = %diagnostics.id(),
                    op = diagnostics.label(),
                    reason = panic_reason(payload.as_ref()),
                    "Service panicked while handling request"
                );
                Response::bad_request()
            }
        };
        (response, entry.name())
    }
}

fn log_unmatched(request: &Request, connection: &ConnectionContext) {
    tracing::info!(
        path = request.path(),
        remote_addr = %connection.peer_addr(),
        x_real_ip = request.header_str(X_REAL_IP),
        x_forwarded_for = request.header_str(X_FORWARDED_FOR),
        "No service claims path"
    );
}

fn panic_reason(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{Service, ServiceError};
    use http::header::{CONNECTION, CONTENT_DISPOSITION, X_CONTENT_TYPE_OPTIONS};
    use http::{HeaderValue, Method, StatusCode, Version};
    use std::io::Write;
    use std::sync::Mutex;

    enum Behavior {
        Echo,
        Fail,
        Panic,
        SetsConnectionClose,
    }

    struct TestService {
        prefix: &'static str,
        behavior: Behavior,
        seen_labels: Mutex<Vec<String>>,
    }

    impl TestService {
        fn new(prefix: &'static str, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                prefix,
                behavior,
                seen_labels: Mutex::new(Vec::new()),
            })
        }
    }

    impl Service for TestService {
        fn claims(&self, path: &str) -> bool {
            path.starts_with(self.prefix)
        }

        fn handle_request(
            &self,
            request: Request,
            _connection: &ConnectionContext,
            diagnostics: &DiagnosticContext,
        ) -> Result<Response, ServiceError> {
            self.seen_labels
                .lock()
                .unwrap()
                .push(diagnostics.label().to_string());
            match self.behavior {
                Behavior::Echo => Ok(Response::new(StatusCode::OK).with_body(request.body().clone())),
                Behavior::Fail => Err("backend unavailable".into()),
                Behavior::Panic => panic!("service bug"),
                Behavior::SetsConnectionClose => Ok(Response::new(StatusCode::OK)
                    .with_header(CONNECTION, HeaderValue::from_static("close"))),
            }
        }
    }

    fn dispatcher(services: Vec<(&str, Arc<TestService>)>) -> Dispatcher {
        let mut registry = ServiceRegistry::new();
        for (name, svc) in services {
            registry.register(name, svc).unwrap();
        }
        Dispatcher::new(Arc::new(registry))
    }

    fn ctx() -> ConnectionContext {
        ConnectionContext::new(
            "198.51.100.7:40000".parse().unwrap(),
            "127.0.0.1:8080".parse().unwrap(),
        )
    }

    fn assert_security_headers(response: &Response) {
        assert_eq!(response.headers()[X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(response.headers()[CONTENT_DISPOSITION], "attachment");
    }

    /// Writer that appends log output to a shared buffer.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn routes_to_claiming_service() {
        let echo = TestService::new("echo", Behavior::Echo);
        let dispatcher = dispatcher(vec![("echo", echo.clone())]);
        let request = Request::builder(Method::POST, "/echo/x?debug=1")
            .body("hello")
            .build();

        let response = dispatcher.handle(request, &ctx());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(&response.body()[..], b"hello");
        assert_security_headers(&response);
        assert!(response.is_keep_alive());
        assert_eq!(*echo.seen_labels.lock().unwrap(), vec!["POST /echo/x".to_string()]);
    }

    #[test]
    fn unmatched_path_is_bad_request_and_logged() {
        let dispatcher = dispatcher(vec![("echo", TestService::new("echo", Behavior::Echo))]);
        let request = Request::builder(Method::GET, "/missing/thing")
            .header("X-Real-IP", "203.0.113.9")
            .header("X-Forwarded-For", "203.0.113.9, 10.0.0.1")
            .build();

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let response =
            tracing::subscriber::with_default(subscriber, || dispatcher.handle(request, &ctx()));

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.body().is_empty());
        assert_security_headers(&response);

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("No service claims path"), "logs: {logs}");
        assert!(logs.contains("/missing/thing"), "logs: {logs}");
        assert!(logs.contains("198.51.100.7:40000"), "logs: {logs}");
        assert!(logs.contains("203.0.113.9"), "logs: {logs}");
    }

    #[test]
    fn decoded_path_is_routed_and_malformed_escape_is_not() {
        let echo = TestService::new("echo", Behavior::Echo);
        let dispatcher = dispatcher(vec![("echo", echo.clone())]);

        let response = dispatcher.handle(Request::builder(Method::GET, "/ech%6F").build(), &ctx());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*echo.seen_labels.lock().unwrap(), vec!["GET /echo".to_string()]);

        let response = dispatcher.handle(Request::builder(Method::GET, "/echo%zz").build(), &ctx());
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_security_headers(&response);
        assert_eq!(echo.seen_labels.lock().unwrap().len(), 1);
    }

    #[test]
    fn service_error_becomes_bad_request() {
        let dispatcher = dispatcher(vec![("fail", TestService::new("fail", Behavior::Fail))]);
        let response = dispatcher.handle(Request::builder(Method::GET, "/fail").build(), &ctx());
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_security_headers(&response);
        assert!(response.is_keep_alive());
    }

    #[test]
    fn service_panic_is_contained() {
        let dispatcher = dispatcher(vec![("boom", TestService::new("boom", Behavior::Panic))]);
        let response = dispatcher.handle(Request::builder(Method::GET, "/boom").build(), &ctx());
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_security_headers(&response);

        // The dispatcher stays usable afterwards.
        let response = dispatcher.handle(Request::builder(Method::GET, "/boom").build(), &ctx());
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn keep_alive_decided_by_request_not_service() {
        let dispatcher = dispatcher(vec![(
            "svc",
            TestService::new("svc", Behavior::SetsConnectionClose),
        )]);
        let response = dispatcher.handle(Request::builder(Method::GET, "/svc").build(), &ctx());
        assert!(response.is_keep_alive());

        let request = Request::builder(Method::GET, "/svc")
            .version(Version::HTTP_10)
            .build();
        let response = dispatcher.handle(request, &ctx());
        assert!(!response.is_keep_alive());
        assert_eq!(response.headers()[CONNECTION], "close");
    }
}
