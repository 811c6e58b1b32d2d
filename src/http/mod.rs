//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → pipeline.rs (TLS, idle timeout, stage ordering)
//!     → codec.rs (bytes → head / body frames, size limits)
//!     → aggregate.rs (frames → one in-memory Request)
//!     → dispatcher.rs (registry lookup, service call, headers, keep-alive)
//!     → response.rs (serialize with Content-Length)
//!     → Send to client
//! ```
//!
//! server.rs owns the listeners and runtimes and wires all of the above.

pub mod aggregate;
pub mod codec;
pub mod dispatcher;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;

pub use dispatcher::Dispatcher;
pub use request::{Request, RequestHead};
pub use response::Response;
pub use server::{Gateway, GatewayError};
