//! Client side of a secured gateway.
//!
//! [`AuthClient`] logs in with basic credentials, keeps the bearer token it
//! receives and attaches it to every later command.

pub mod auth;
pub mod token;

pub use auth::{AuthClient, AuthError, AuthState, CommandOutput};
pub use token::extract_token;
