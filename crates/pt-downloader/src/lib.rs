#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::multiple_crate_versions)]

//! Uniform downloader engine trait (§4.B) plus qBittorrent and Transmission
//! backends and a process-wide handle registry.

pub mod error;
pub mod info_hash;
pub mod model;
pub mod qbittorrent;
pub mod registry;
pub mod transmission;

pub use error::{DownloaderError, Result};
pub use model::{
    AddOptions, AddResult, DownloaderKind, DownloaderStatus, ListFilter, TorrentInfo,
    FREE_SPACE_UNKNOWN_SENTINEL_BYTES,
};
pub use registry::{DownloaderFactoryParams, DownloaderHandle, Registry};

use async_trait::async_trait;

/// Uniform interface over a single downloader backend (§4.B).
///
/// Every backend — qBittorrent and Transmission alike — implements the full
/// capability set; there is no optional/unsupported subset in this domain.
#[async_trait]
pub trait DownloaderEngine: Send + Sync {
    /// Display name this handle is registered under.
    fn name(&self) -> &str;

    /// Cheap reachability check.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable.
    async fn ping(&self) -> Result<()>;

    /// Establish or refresh the backend session.
    ///
    /// # Errors
    ///
    /// Returns [`DownloaderError::AuthFailed`] if credentials are rejected.
    async fn authenticate(&self) -> Result<()>;

    /// Backend version string.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn get_version(&self) -> Result<String>;

    /// Backend health/version summary.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn get_status(&self) -> Result<DownloaderStatus>;

    /// Free bytes available at `path`. Implementations that cannot resolve
    /// the path return [`FREE_SPACE_UNKNOWN_SENTINEL_BYTES`] rather than
    /// failing the whole request.
    ///
    /// # Errors
    ///
    /// Returns an error only on outright transport/auth failure.
    async fn get_free_space(&self, path: &str) -> Result<u64>;

    /// Whether a torrent with the given info hash already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn check_torrent_exists(&self, hash: &str) -> Result<bool>;

    /// Add a torrent from raw `.torrent` bytes. Duplicates return
    /// `success = true` with the existing hash rather than an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the request outright.
    async fn add_torrent_file(&self, bytes: Vec<u8>, opts: AddOptions) -> Result<AddResult>;

    /// Add a torrent from a URL the backend fetches itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the request outright.
    async fn add_torrent_url(&self, url: &str, opts: AddOptions) -> Result<AddResult>;

    /// Pause a torrent.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn pause(&self, hash: &str) -> Result<()>;

    /// Resume a paused torrent.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn resume(&self, hash: &str) -> Result<()>;

    /// Remove a torrent, optionally deleting its downloaded data.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn remove(&self, hash: &str, delete_data: bool) -> Result<()>;

    /// List torrents matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn list_torrents(&self, filter: ListFilter) -> Result<Vec<TorrentInfo>>;

    /// Fetch a single torrent by info hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn get_torrent(&self, hash: &str) -> Result<Option<TorrentInfo>>;

    /// Release any held connections. Backends with nothing to release may
    /// rely on this default no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if cleanup fails.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
