//! Service gateway library.
//!
//! An HTTP/HTTPS front door that assembles each request in memory and hands
//! it to the first registered [`routing::Service`] claiming its path, plus a
//! client that authenticates against a secured gateway.

pub mod client;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod security;
pub mod services;

pub use client::{AuthClient, AuthError};
pub use config::{ClientConfig, GatewayConfig};
pub use http::{Gateway, GatewayError, Request, Response};
pub use lifecycle::Shutdown;
pub use routing::{Service, ServiceError, ServiceRegistry};
