//! Structured logging
//!
//! Library code emits `tracing` events; binaries install a subscriber once at
//! startup with [`init_logging`]. `RUST_LOG` overrides the configured level,
//! e.g. `RUST_LOG=cap_stitch=debug,scroll_capture=trace`.
//!
//! Field names used across events: `frame`, `top`, `bottom`, `overlap`,
//! `similarity`, `ratio`, `state`, `captured_count`.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt as fmt_layer};

use crate::error::{CaptureError, CaptureResult};

static LOGGING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-friendly output on stderr
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(CaptureError::validation(
                "log_format",
                "expected 'pretty' or 'json'",
                other,
            )),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => f.write_str("pretty"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level filter (trace, debug, info, warn, error)
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Install the global subscriber.
///
/// Fails if called twice or if another subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> CaptureResult<()> {
    if LOGGING_INITIALIZED.get().is_some() {
        return Err(CaptureError::state(
            "initialized",
            "init_logging",
            "logging already initialized",
        ));
    }

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            CaptureError::config("log_level", &config.level, e.to_string())
        })?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = match config.format {
        LogFormat::Pretty => registry
            .with(
                fmt_layer::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt_layer::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false),
            )
            .try_init(),
    };
    installed.map_err(|e| CaptureError::state("uninitialized", "init_logging", e.to_string()))?;

    let _ = LOGGING_INITIALIZED.set(());
    Ok(())
}
