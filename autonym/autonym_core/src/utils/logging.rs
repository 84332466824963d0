//! Logging setup.
//!
//! Autonym logs through `tracing`. This module maps a [`LogLevel`] onto a
//! `tracing-subscriber` filter and installs a formatting subscriber for
//! binaries and tests that have not installed one themselves.

use crate::error::BoxError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Log level.
///
/// Ordered by increasing severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Per-stage tracing of every lifecycle call.
    Trace,

    /// Store calls and policy outcomes.
    Debug,

    /// Registration and initialization.
    #[default]
    Info,

    /// Denials and failed operations.
    Warning,

    /// Errors only.
    Error,
}

impl LogLevel {
    /// Get the name of this log level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    /// Get the `tracing` filter directive for this level.
    pub fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }

    /// Check if this log level is at least as severe as the given level.
    pub fn is_at_least(&self, level: LogLevel) -> bool {
        *self >= level
    }
}

impl FromStr for LogLevel {
    type Err = String;

    /// Parse a level name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "error" | "err" => Ok(Self::Error),
            other => Err(format!("unknown log level `{}`", other)),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Install a global formatting subscriber.
///
/// `RUST_LOG` takes precedence over `level` when it is set.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed. Callers
/// that may run more than once, such as tests, can ignore it.
pub fn init_logging(level: LogLevel) -> Result<(), BoxError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_directive()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Error > LogLevel::Warning);
        assert!(LogLevel::Warning > LogLevel::Info);
        assert!(LogLevel::Info > LogLevel::Debug);
        assert!(LogLevel::Debug > LogLevel::Trace);
        assert!(LogLevel::Warning.is_at_least(LogLevel::Info));
        assert!(!LogLevel::Debug.is_at_least(LogLevel::Info));
    }

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("TRACE".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert_eq!("warn".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("Err".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_directives() {
        assert_eq!(LogLevel::Warning.as_directive(), "warn");
        assert_eq!(LogLevel::default().as_directive(), "info");
        assert_eq!(LogLevel::Debug.to_string(), "DEBUG");
    }

    #[test]
    fn test_init_logging_is_repeatable() {
        let _ = init_logging(LogLevel::Debug);
        // A second install fails instead of panicking
        assert!(init_logging(LogLevel::Debug).is_err());
    }
}
