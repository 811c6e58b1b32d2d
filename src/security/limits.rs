//! Request framing limits.
//!
//! # Responsibilities
//! - Bound request line length
//! - Bound header block size
//! - Bound individual body chunk size
//! - Bound aggregated request body size
//!
//! # Design Decisions
//! - Limits checked before full parsing (early rejection)
//! - Oversized heads/chunks → 400 Bad Request, oversized bodies → 413
//! - Every violation closes the connection

use crate::config::LimitsConfig;

/// Resolved framing limits for one listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramingLimits {
    pub max_initial_line_length: usize,
    pub max_header_size: usize,
    pub max_chunk_size: usize,
    pub max_request_size: usize,
}

impl FramingLimits {
    pub fn from_config(config: &LimitsConfig) -> Self {
        Self {
            max_initial_line_length: config.max_initial_line_length(),
            max_header_size: config.max_header_size(),
            max_chunk_size: config.max_chunk_size(),
            max_request_size: config.max_request_size(),
        }
    }
}

impl Default for FramingLimits {
    fn default() -> Self {
        Self::from_config(&LimitsConfig::default())
    }
}
