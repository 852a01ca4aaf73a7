//! Error types for downloader backends.

use std::error::Error;

use thiserror::Error;

/// Primary error type for downloader operations.
#[derive(Debug, Error)]
pub enum DownloaderError {
    /// Operation is not supported by this backend.
    #[error("downloader operation not supported")]
    Unsupported {
        /// Operation identifier.
        operation: &'static str,
    },
    /// Authentication with the downloader failed.
    #[error("authentication failed for downloader '{downloader_name}'")]
    AuthFailed {
        /// Downloader this handle is bound to.
        downloader_name: String,
    },
    /// The request reached the downloader but it reported failure.
    #[error("downloader operation '{operation}' failed")]
    OperationFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Downloader this handle is bound to.
        downloader_name: String,
        /// Underlying transport/decode failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The torrent referenced by the operation does not exist in the downloader.
    #[error("torrent '{hash}' not found in downloader '{downloader_name}'")]
    NotFound {
        /// Downloader this handle is bound to.
        downloader_name: String,
        /// Missing info hash.
        hash: String,
    },
    /// No handle is registered under the requested name and none could be
    /// constructed ad-hoc.
    #[error("no downloader registered under name '{name}'")]
    UnknownDownloader {
        /// Requested downloader name.
        name: String,
    },
}

/// Convenience alias for downloader operation results.
pub type Result<T> = std::result::Result<T, DownloaderError>;
