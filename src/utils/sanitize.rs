//! Utilities for sanitizing error messages.
//!
//! Removes control characters and addresses from error messages before they
//! become the detail of an `unknown_error` failure, which ends up in
//! measurement results that may be published.
//!
//! Also provides truncation so a single failure cannot bloat a result.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::MAX_ERROR_MESSAGE_LENGTH;

const SCRUBBED: &str = "[scrubbed]";

static BRACKETED_IPV6: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[[0-9A-Fa-f:.%\w]*:[0-9A-Fa-f:.%\w]*\](:\d+)?").expect("valid IPv6 regex")
});
static BARE_IPV6: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:[0-9A-Fa-f]{0,4}:){3,7}[0-9A-Fa-f]{0,4}\b").expect("valid IPv6 regex")
});
static IPV4: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}(?::\d+)?\b").expect("valid IPv4 regex")
});
static ABSOLUTE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|\s)(?:/[\w.\-]+){2,}").expect("valid path regex"));

/// Sanitizes an error message by removing control characters.
///
/// Control characters (0x00-0x1F, except newline/tab/carriage return) can cause
/// issues when serialized or displayed in logs. This function removes
/// them while preserving readability.
///
/// # Arguments
///
/// * `message` - The error message to sanitize
///
/// # Returns
///
/// A sanitized version of the message with control characters removed.
pub fn sanitize_error_message(message: &str) -> String {
    message
        .chars()
        .filter(|c| {
            let code = *c as u32;
            code >= 0x20 // Printable ASCII starts at 0x20 (space)
                || code == 0x09 // Tab
                || code == 0x0A // Newline
                || code == 0x0D // Carriage return
        })
        .filter(|c| *c != '\u{7F}')
        .collect()
}

/// Replaces IP addresses (with optional ports) and absolute filesystem paths
/// with `[scrubbed]`.
pub fn scrub_addresses(message: &str) -> String {
    let message = BRACKETED_IPV6.replace_all(message, SCRUBBED);
    let message = IPV4.replace_all(&message, SCRUBBED);
    let message = BARE_IPV6.replace_all(&message, SCRUBBED);
    let message = ABSOLUTE_PATH.replace_all(&message, format!("${{1}}{SCRUBBED}"));
    message.into_owned()
}

/// Truncates `message` to at most `max` bytes on a character boundary,
/// appending an indicator when something was cut.
pub fn truncate_message(message: &str, max: usize) -> String {
    if message.len() <= max {
        return message.to_string();
    }
    let mut end = max.saturating_sub(3);
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &message[..end])
}

/// Builds the detail of an `unknown_error` failure.
///
/// This function:
/// 1. Removes control characters
/// 2. Scrubs addresses and paths
/// 3. Collapses the message onto one line
/// 4. Truncates to `MAX_ERROR_MESSAGE_LENGTH`
pub fn sanitize_failure_detail(message: &str) -> String {
    let sanitized = scrub_addresses(&sanitize_error_message(message));
    let single_line = sanitized.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_message(&single_line, MAX_ERROR_MESSAGE_LENGTH)
}
