//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, socket options)
//!     → tls.rs (optional TLS handshake material)
//!     → connection.rs (context, lifecycle tracking)
//!     → Hand off to the HTTP pipeline
//! ```
//!
//! # Design Decisions
//! - Plaintext and TLS listeners share one worker pool
//! - Each connection tracked for graceful shutdown
//! - TLS is optional and handled as the first pipeline stage

pub mod connection;
pub mod listener;
pub mod tls;

pub use connection::{ConnectionContext, ConnectionId, ConnectionTracker, TlsSession};
pub use listener::{Listener, ListenerError, Scheme};
