//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request path ("/V0/nosql/admin/login")
//!     → registry.rs (strip one leading "/", scan services in order)
//!     → service.rs (each service's `claims` predicate)
//!     → Return: first claiming service or None
//! ```
//!
//! # Design Decisions
//! - Services registered at startup, registry immutable at runtime
//! - No regex in hot path (prefix matching only, see matcher.rs)
//! - Deterministic: same path always resolves to the same service
//! - First claim wins (registration order)

pub mod matcher;
pub mod registry;
pub mod service;

pub use matcher::{AnyMatcher, Matcher, PathPrefixMatcher};
pub use registry::{RegistryError, ServiceEntry, ServiceRegistry};
pub use service::{Service, ServiceError};
