//! Error types for pricescrape.
//!
//! Library crates use [`PriceScrapeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all pricescrape operations.
#[derive(Debug, thiserror::Error)]
pub enum PriceScrapeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error, including retry exhaustion.
    #[error("network error: {0}")]
    Network(String),

    /// Unexpected HTML structure on an item page.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Catalog row rejected during normalization.
    #[error("data quality error: {message}")]
    DataQuality { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Structural invariant violated (odd sale token count, bad override entry, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PriceScrapeError>;

impl PriceScrapeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a data quality error from any displayable message.
    pub fn data_quality(msg: impl Into<String>) -> Self {
        Self::DataQuality {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the pipeline should degrade this error to a "no sales" placeholder.
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}
