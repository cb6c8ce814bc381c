//! Error types for loading cluster snapshots and settings.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while loading or validating the cluster model.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Toml(String),

    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}
