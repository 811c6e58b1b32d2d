//! Services shipped with the gateway binary.

pub mod health;

pub use health::HealthService;
