//! Logger initialization.
//!
//! Every line carries the seconds elapsed since the logger was installed, so
//! the debug lines of the resolver, dialer and transport decorators read as a
//! timeline of the measurement.

use std::io::Write;
use std::time::Instant;

use colored::*;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;

use crate::config::{LogFormat, NetConfig};
use crate::error_handling::InitializationError;

static LOGGER_START: Lazy<Instant> = Lazy::new(Instant::now);

/// Dependencies whose logs are capped below the requested level.
const QUIET_MODULES: &[(&str, LevelFilter)] = &[
    // hickory retries truncated UDP answers itself
    ("hickory_proto", LevelFilter::Error),
    ("hickory_resolver", LevelFilter::Warn),
    ("rustls", LevelFilter::Warn),
];

fn colored_level(level: Level) -> ColoredString {
    let label = format!("{level:<5}");
    match level {
        Level::Error => label.red(),
        Level::Warn => label.yellow(),
        Level::Info => label.green(),
        Level::Debug => label.blue(),
        Level::Trace => label.purple(),
    }
}

/// One plain-text log line, e.g. `[  0.012345] DEBUG probe_netx::dialer dial ...`.
fn plain_line(elapsed: f64, level: Level, target: &str, message: &str) -> String {
    format!(
        "[{elapsed:>10.6}] {} {} {message}",
        colored_level(level),
        target.cyan()
    )
}

/// One JSON log line with both a wall-clock timestamp and the relative time.
fn json_line(elapsed: f64, level: Level, target: &str, message: &str) -> String {
    serde_json::json!({
        "ts": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "t": elapsed,
        "level": level.as_str(),
        "target": target,
        "msg": message,
    })
    .to_string()
}

/// Initializes the logger with the specified level and format.
///
/// `RUST_LOG` is honoured for modules not listed here; `level` applies to
/// this crate and as the global default.
///
/// # Errors
///
/// Returns `InitializationError::LoggerError` if a logger is already set.
///
/// # Examples
///
/// ```bash
/// RUST_LOG=probe_netx=debug,rustls=info cargo test
/// ```
pub fn init_logger_with(level: LevelFilter, format: LogFormat) -> Result<(), InitializationError> {
    colored::control::set_override(matches!(format, LogFormat::Plain));
    Lazy::force(&LOGGER_START);

    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(level);
    for (module, cap) in QUIET_MODULES {
        builder.filter_module(module, level.min(*cap));
    }
    builder.filter_module("probe_netx", level);

    builder.format(move |buf, record| {
        let elapsed = LOGGER_START.elapsed().as_secs_f64();
        let message = record.args().to_string();
        let line = match format {
            LogFormat::Json => json_line(elapsed, record.level(), record.target(), &message),
            LogFormat::Plain => plain_line(elapsed, record.level(), record.target(), &message),
        };
        writeln!(buf, "{line}")
    });

    builder.try_init().map_err(InitializationError::from)?;
    Ok(())
}

/// Initializes the logger from the level and format in `config`.
///
/// # Errors
///
/// Returns `InitializationError::LoggerError` if a logger is already set.
pub fn init_logger(config: &NetConfig) -> Result<(), InitializationError> {
    init_logger_with(config.log_level.into(), config.log_format)
}
