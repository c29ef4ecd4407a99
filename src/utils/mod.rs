//! Utility functions.
//!
//! This module provides:
//! - `host:port` splitting and joining
//! - Sanitization of error messages before they become failure details

pub mod address;
pub mod sanitize;

pub use address::{join_host_port, split_host_port};
