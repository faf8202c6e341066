//! Error types for the migration bot.
//!
//! Library crates use [`MigrateError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all migration operations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP failure while fetching the source page.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// The fetched page did not contain the expected content subtree.
    #[error("extraction error: {message}")]
    Extraction { message: String },

    /// The model service call itself failed.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// The model produced output that still looks like raw markup.
    #[error(
        "conversion quality error: {count} raw structural elements found (limit {threshold}), conversion is likely incomplete"
    )]
    ConversionQuality { count: usize, threshold: usize },

    /// The job's own output path has no usable slug mapping.
    #[error("slug resolution error: no destination mapped for '{key}'")]
    SlugResolution { key: String },

    /// The corpus build rejected the written document.
    #[error("build verification failed:\n{diagnostic}")]
    BuildVerification { diagnostic: String },

    /// Version-control or change-request failure.
    #[error("publish error: {0}")]
    Publish(String),

    /// Issue tracker API failure (listing, commenting, retitling).
    #[error("tracker error: {0}")]
    Tracker(String),

    /// Diff image rendering failure.
    #[error("render error: {0}")]
    Render(String),

    /// Data validation error (malformed ticket, invalid URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MigrateError>;

impl MigrateError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an extraction error from any displayable message.
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction {
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

    /// Whether a stage may retry the operation that produced this error.
    ///
    /// Only the network-facing stages (fetching, model conversion) are retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Fetch(_) | Self::Conversion(_) | Self::ConversionQuality { .. }
        )
    }
}
