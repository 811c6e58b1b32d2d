//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger → accept loops stop → idle connections close → drain → pools torn down
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, close
//! - Drain has a deadline (`timeouts.shutdown_grace_secs`)

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
