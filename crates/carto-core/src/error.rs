use std::path::PathBuf;

/// Errors that can occur across the carto crates.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary crate converts to `miette::Report` at the boundary.
///
/// # Examples
///
/// ```
/// use carto_core::CartoError;
///
/// let err = CartoError::Config("missing map_tokens".into());
/// assert!(err.to_string().contains("missing map_tokens"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum CartoError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Tag cache storage failure.
    #[error("cache error: {0}")]
    Cache(String),

    /// Source code parsing failure.
    #[error("parse error: {0}")]
    Parse(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The reference graph grew past the safety cap during construction.
    #[error("reference graph too large ({0} edges)")]
    GraphTooLarge(usize),
}
