use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Severity of a message emitted through an [`OutputSink`].
///
/// # Examples
///
/// ```
/// use carto_core::Severity;
///
/// let s: Severity = serde_json::from_str("\"warning\"").unwrap();
/// assert_eq!(s, Severity::Warning);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Progress and summary messages.
    Info,
    /// A recoverable condition the caller should know about.
    Warning,
    /// A failure that degraded the result but did not abort the run.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Channel for informational, warning, and error messages produced while a
/// map is generated.
///
/// The engine never prints or terminates on a recoverable condition; every
/// recovery path is reported through the sink supplied by the caller.
/// Implementations must be safe to share across threads since map generation
/// may be offloaded to a blocking task.
pub trait OutputSink: Send + Sync {
    /// Deliver one message at the given severity.
    fn emit(&self, severity: Severity, message: &str);
}

/// Sink that writes info to stdout and warnings/errors to stderr.
///
/// # Examples
///
/// ```
/// use carto_core::{ConsoleSink, OutputSink, Severity};
///
/// let sink = ConsoleSink;
/// sink.emit(Severity::Info, "Repo-map: 1.2 k-tokens");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn emit(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => println!("{message}"),
            Severity::Warning => eprintln!("Warning: {message}"),
            Severity::Error => eprintln!("Error: {message}"),
        }
    }
}

/// Sink that discards every message. Used by the MCP server and in tests.
///
/// # Examples
///
/// ```
/// use carto_core::{OutputSink, Severity, SilentSink};
///
/// SilentSink.emit(Severity::Error, "nobody hears this");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSink;

impl OutputSink for SilentSink {
    fn emit(&self, _severity: Severity, _message: &str) {}
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use carto_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// The rendered map as plain text.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys, map plus report.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
