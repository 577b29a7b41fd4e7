//! Error types for Riskbase.
//!
//! Library crates use [`RiskbaseError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Riskbase operations.
#[derive(Debug, thiserror::Error)]
pub enum RiskbaseError {
    /// A lookup did not match anything (occupation, table, visualization).
    #[error("data not found: {0}")]
    DataNotFound(String),

    /// A query was issued before the service was initialized.
    #[error("query service is not initialized")]
    ServiceNotInitialized,

    /// Pipeline validation failure. Carries the individual error messages.
    #[error("invalid data: {message} ({} error(s))", errors.len())]
    InvalidData {
        message: String,
        errors: Vec<String>,
    },

    /// A cache operation failed (poisoned lock, etc.).
    #[error("cache error: {0}")]
    Cache(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching an extraction source.
    #[error("network error: {0}")]
    Network(String),

    /// JSON or TOML parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RiskbaseError>;

impl RiskbaseError {
    /// Create a lookup-miss error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::DataNotFound(what.into())
    }

    /// Create an invalid-data error carrying the individual problems.
    pub fn invalid_data(msg: impl Into<String>, errors: Vec<String>) -> Self {
        Self::InvalidData {
            message: msg.into(),
            errors,
        }
    }

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

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DataNotFound(_) => "DATA_NOT_FOUND",
            Self::ServiceNotInitialized => "SERVICE_NOT_INITIALIZED",
            Self::InvalidData { .. } => "INVALID_DATA",
            Self::Cache(_) => "CACHE_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Network(_) => "NETWORK_ERROR",
            Self::Parse { .. } => "PARSE_ERROR",
            Self::Io { .. } => "IO_ERROR",
        }
    }

    /// Whether retrying the failed operation could succeed.
    ///
    /// Lookup misses, precondition violations, and validation failures are
    /// deterministic and never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Cache(_) | Self::Network(_) | Self::Io { .. })
    }
}
