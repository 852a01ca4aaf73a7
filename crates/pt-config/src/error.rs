//! Error types for configuration operations.

use thiserror::Error;

/// Result alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while loading or mutating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A database operation failed.
    #[error("configuration database operation '{operation}' failed")]
    Database {
        /// Operation identifier, for diagnostics.
        operation: &'static str,
        /// Underlying SQL error.
        #[source]
        source: sqlx::Error,
    },
    /// A stored row could not be decoded into its domain representation.
    #[error("stored configuration row failed to decode")]
    RowDecode {
        /// Underlying decode error from `pt-data`.
        #[source]
        source: pt_data::DataError,
    },
    /// A filter rule pattern failed validation (§3 invariant: `validate`
    /// must succeed before persistence).
    #[error("filter rule pattern is invalid")]
    InvalidPattern {
        /// Underlying validation error.
        #[source]
        source: pt_filter::FilterError,
    },
    /// Attempted to register a downloader of an unknown type.
    #[error("unknown downloader type '{value}'")]
    UnknownDownloaderType {
        /// The offending value.
        value: String,
    },
}

impl From<pt_data::DataError> for ConfigError {
    fn from(source: pt_data::DataError) -> Self {
        Self::RowDecode { source }
    }
}

impl From<pt_filter::FilterError> for ConfigError {
    fn from(source: pt_filter::FilterError) -> Self {
        Self::InvalidPattern { source }
    }
}
