//! Error types for EmbedM
//!
//! This module defines the hard-failure error type used throughout the
//! application, using `thiserror` for ergonomic error handling.
//!
//! Recoverable pipeline failures (missing source files, bad directives,
//! cycles) are not errors — they travel as [`crate::status::Status`] values
//! on plan nodes. `EmbedmError` covers the paths that genuinely abort a run:
//! unusable configuration, invalid CLI combinations, and I/O on output
//! targets.

use thiserror::Error;

/// Main error type for EmbedM operations
#[derive(Error, Debug)]
pub enum EmbedmError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid command-line argument combinations
    #[error("Usage error: {0}")]
    Usage(String),

    /// File cache construction or policy errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// Plugin registry errors
    #[error("Plugin error: {0}")]
    Plugin(String),

    /// Compilation aborted by the user at an error prompt
    #[error("Compilation aborted by user")]
    Aborted,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for EmbedM operations
///
/// Uses `anyhow::Error` for rich context and easy propagation.
pub type Result<T> = anyhow::Result<T>;
