//! Aggregate error type for the decision pipeline, push worker, scheduler,
//! free-end monitor, cleanup engine, and bootstrap wiring.
//!
//! # Design
//! - Centralize orchestration-level errors in one enum.
//! - Wrap each collaborator's own error type rather than flattening it, so
//!   callers can match on the source crate when it matters.

use thiserror::Error;

use crate::site::SiteError;

/// Result alias used throughout `pt-core`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors surfaced by core orchestration.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration loading or snapshot assembly failed.
    #[error("configuration error")]
    Config(#[from] pt_config::ConfigError),
    /// Filter rule validation or compilation failed.
    #[error("filter error")]
    Filter(#[from] pt_filter::FilterError),
    /// A downloader operation failed.
    #[error("downloader error")]
    Downloader(#[from] pt_downloader::DownloaderError),
    /// A torrent record store operation failed.
    #[error("store error")]
    Store(#[from] pt_store::StoreError),
    /// The external site collaborator failed.
    #[error("site collaborator error")]
    Site(#[from] SiteError),
    /// A required environment variable was not set.
    #[error("required environment variable '{name}' is not set")]
    MissingEnv {
        /// Name of the missing variable.
        name: &'static str,
    },
    /// A filesystem operation failed.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
    /// A connection pool could not be established or a query failed outside
    /// the collaborator crates above.
    #[error("database error")]
    Database(#[from] sqlx::Error),
    /// Metrics registry construction or logging initialisation failed.
    #[error("telemetry initialisation failed")]
    Telemetry(#[source] anyhow::Error),
    /// A bounded task exceeded its deadline (spec.md §9: fresh 10-minute
    /// context per scheduler tick).
    #[error("task '{task}' timed out")]
    Timeout {
        /// Name of the task that timed out, for diagnostics.
        task: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_env_formats_name() {
        let err = CoreError::MissingEnv { name: "DATABASE_URL" };
        assert_eq!(err.to_string(), "required environment variable 'DATABASE_URL' is not set");
    }

    #[test]
    fn timeout_formats_task() {
        let err = CoreError::Timeout { task: "decision_pipeline" };
        assert_eq!(err.to_string(), "task 'decision_pipeline' timed out");
    }
}
