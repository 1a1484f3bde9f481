//! Structured logging configuration.

use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Logging settings, as read from the `[logging]` config table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset (e.g. `info`,
    /// `feedgroups=debug`).
    pub level: Option<String>,
    /// Append log lines to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Builds the event filter.
    ///
    /// `RUST_LOG` wins; otherwise the configured level, otherwise `debug`
    /// when verbose and `info` when not.
    #[must_use]
    pub fn filter(&self, verbose: bool) -> EnvFilter {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }
        let fallback = if verbose { "debug" } else { "info" };
        let directive = self.level.as_deref().unwrap_or(fallback);
        EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(fallback))
    }
}
