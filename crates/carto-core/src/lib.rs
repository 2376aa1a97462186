//! Core types, configuration, and error handling for carto.
//!
//! This crate provides the shared foundation used by all other carto crates:
//! - [`CartoError`] — unified error type using `thiserror`
//! - [`CartoConfig`] — configuration loaded from `.carto.toml`
//! - Shared types: [`Severity`], [`OutputSink`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{BoostConfig, CacheConfig, CartoConfig, MapConfig};
pub use error::CartoError;
pub use types::{ConsoleSink, OutputFormat, OutputSink, Severity, SilentSink};

/// A convenience `Result` type for carto operations.
pub type Result<T> = std::result::Result<T, CartoError>;
