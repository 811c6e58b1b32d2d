//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → limits.rs (request line, header block, chunk and body size)
//!     → [dispatch]
//! Outgoing response:
//!     → headers.rs (mandated security headers)
//! ```
//!
//! # Design Decisions
//! - Fail closed: framing violations close the connection
//! - Forwarding headers are logged, never trusted

pub mod headers;
pub mod limits;

pub use headers::apply_required_headers;
pub use limits::FramingLimits;
