//! Error types for the filter matcher cache.

use thiserror::Error;

/// Result alias for filter-rule operations.
pub type Result<T> = std::result::Result<T, FilterError>;

/// Errors raised while validating or compiling a filter rule pattern.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The pattern was empty or only whitespace.
    #[error("pattern must not be empty")]
    EmptyPattern,
    /// The pattern exceeded the maximum allowed length.
    #[error("pattern exceeds maximum length of {max} characters")]
    PatternTooLong {
        /// Length of the rejected pattern.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },
    /// The pattern could not be compiled into a matcher.
    #[error("pattern failed to compile")]
    InvalidPattern {
        /// Underlying regex compilation error.
        #[source]
        source: regex::Error,
    },
}
