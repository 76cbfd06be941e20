//! Severity levels and the logging methods that map onto them.

use core::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Severity of an item, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Diagnostic chatter.
    Debug,
    /// Informational.
    Info,
    /// Something unexpected that did not fail.
    Warning,
    /// A failure.
    Error,
    /// A failure that needs immediate attention.
    Critical,
}

impl Level {
    /// All levels, least severe first.
    pub const ALL: [Level; 5] = [
        Level::Debug,
        Level::Info,
        Level::Warning,
        Level::Error,
        Level::Critical,
    ];

    /// The lowercase name used in options and telemetry.
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Critical => "critical",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognised level name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognised level `{0}`")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warning" | "warn" => Ok(Level::Warning),
            "error" => Ok(Level::Error),
            "critical" => Ok(Level::Critical),
            other => Err(ParseLevelError(other.to_owned())),
        }
    }
}

/// The public logging entry points.
///
/// Each method is forwarded to the transport under its own name so a
/// transport can tell `warn` from `warning` or `log` from `debug`, even though
/// several methods share a [`Level`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Uses the configured `logLevel`.
    Log,
    /// [`Level::Debug`].
    Debug,
    /// [`Level::Info`].
    Info,
    /// [`Level::Warning`].
    Warn,
    /// [`Level::Warning`].
    Warning,
    /// [`Level::Error`].
    Error,
    /// [`Level::Critical`].
    Critical,
}

impl Method {
    /// Every method, in declaration order.
    pub const ALL: [Method; 7] = [
        Method::Log,
        Method::Debug,
        Method::Info,
        Method::Warn,
        Method::Warning,
        Method::Error,
        Method::Critical,
    ];

    /// The method name as a transport sees it.
    pub const fn as_str(self) -> &'static str {
        match self {
            Method::Log => "log",
            Method::Debug => "debug",
            Method::Info => "info",
            Method::Warn => "warn",
            Method::Warning => "warning",
            Method::Error => "error",
            Method::Critical => "critical",
        }
    }

    /// The level an item sent through this method gets, given the configured
    /// level for plain `log` calls.
    pub const fn level(self, log_level: Level) -> Level {
        match self {
            Method::Log => log_level,
            Method::Debug => Level::Debug,
            Method::Info => Level::Info,
            Method::Warn | Method::Warning => Level::Warning,
            Method::Error => Level::Error,
            Method::Critical => Level::Critical,
        }
    }

    /// The method that delivers items of `level`.
    pub const fn for_level(level: Level) -> Method {
        match level {
            Level::Debug => Method::Debug,
            Level::Info => Method::Info,
            Level::Warning => Method::Warning,
            Level::Error => Method::Error,
            Level::Critical => Method::Critical,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
