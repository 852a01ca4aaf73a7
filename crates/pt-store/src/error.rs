//! Error types for the torrent record store.

use thiserror::Error;

/// Result alias for torrent store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by the torrent record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Migrations failed to apply.
    #[error("torrent store migration failed")]
    MigrationFailed {
        /// Underlying migration error.
        #[source]
        source: sqlx::migrate::MigrateError,
    },
    /// A database operation failed.
    #[error("torrent store operation '{operation}' failed")]
    QueryFailed {
        /// Operation identifier, for diagnostics.
        operation: &'static str,
        /// Underlying SQL error.
        #[source]
        source: sqlx::Error,
    },
}

impl StoreError {
    pub(crate) const fn query(operation: &'static str, source: sqlx::Error) -> Self {
        Self::QueryFailed { operation, source }
    }
}
