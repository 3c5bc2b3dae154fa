// src/logging.rs

//! Logging setup for `dagstream` using `tracing` + `tracing-subscriber`.
//!
//! The filter is taken from the first source that is set:
//! 1. `--log-level` on the command line, applied to every target
//! 2. `DAGSTREAM_LOG`, in `EnvFilter` syntax (e.g. `dagstream::engine=debug`)
//! 3. `RUST_LOG`, same syntax
//! 4. `info`
//!
//! Logs go to STDERR; stdout carries the streamed node output. Every line
//! logged while a graph runs carries the `execution{executor=..}` span.

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::format::FmtSpan;

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "DAGSTREAM_LOG";

/// Initialise the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let directives = filter_directives(
        cli_level,
        std::env::var(LOG_ENV).ok().as_deref(),
        std::env::var("RUST_LOG").ok().as_deref(),
    );
    let filter = EnvFilter::try_new(&directives)
        .with_context(|| format!("invalid log filter '{directives}'"))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}

/// Pick the filter directives from the CLI flag and the two env variables.
///
/// Blank env values count as unset.
pub fn filter_directives(
    cli_level: Option<LogLevel>,
    dagstream_log: Option<&str>,
    rust_log: Option<&str>,
) -> String {
    if let Some(level) = cli_level {
        return level.as_directive().to_string();
    }
    [dagstream_log, rust_log]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or("info")
        .to_string()
}
