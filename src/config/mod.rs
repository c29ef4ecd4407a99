//! Library configuration and constants.
//!
//! This module provides:
//! - Configuration constants (timeouts, size limits, defaults)
//! - Logging options and the [`NetConfig`] used to build the chains

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{LogFormat, LogLevel, NetConfig};
