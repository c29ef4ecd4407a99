//! `host:port` handling.
//!
//! Bracketed IPv6 literals are supported in both directions.

use crate::error_handling::AddressError;

/// Splits `address` into host and port.
///
/// Accepts `host:port`, `1.2.3.4:port` and `[v6]:port`. The port is not
/// validated and may be empty.
///
/// # Errors
///
/// Returns an [`AddressError`] when the port is missing, an unbracketed host
/// contains colons, or a bracket is unbalanced.
pub fn split_host_port(address: &str) -> Result<(String, String), AddressError> {
    if let Some(rest) = address.strip_prefix('[') {
        let end = rest
            .find(']')
            .ok_or_else(|| AddressError::MissingBracket(address.to_string()))?;
        let port = rest[end + 1..]
            .strip_prefix(':')
            .ok_or_else(|| AddressError::MissingPort(address.to_string()))?;
        if port.contains(':') {
            return Err(AddressError::TooManyColons(address.to_string()));
        }
        return Ok((rest[..end].to_string(), port.to_string()));
    }
    let colon = address
        .rfind(':')
        .ok_or_else(|| AddressError::MissingPort(address.to_string()))?;
    let host = &address[..colon];
    if host.contains(':') {
        return Err(AddressError::TooManyColons(address.to_string()));
    }
    Ok((host.to_string(), address[colon + 1..].to_string()))
}

/// Joins host and port, bracketing hosts that contain a colon.
pub fn join_host_port(host: &str, port: &str) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
