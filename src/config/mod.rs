//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared with the listener, pipeline and dispatcher
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the gateway starts
//! - All fields have defaults to allow minimal configs
//! - Zero-valued sizes resolve to documented defaults
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_client_config, load_config, ConfigError};
pub use schema::ClientConfig;
pub use schema::GatewayConfig;
pub use schema::LimitsConfig;
pub use schema::ListenerConfig;
pub use schema::TlsConfig;
