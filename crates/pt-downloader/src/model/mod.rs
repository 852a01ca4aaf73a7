//! Shared DTOs for the downloader abstraction (§4.B).

use chrono::{DateTime, Utc};

/// Which downloader backend a handle talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloaderKind {
    /// qBittorrent WebUI v2.
    QBittorrent,
    /// Transmission JSON-RPC.
    Transmission,
}

/// Options accepted by `AddTorrentFile`/`AddTorrentURL`.
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// Destination directory for the torrent's content.
    pub save_path: Option<String>,
    /// Category to apply (qBittorrent concept; folded into Transmission labels).
    pub category: Option<String>,
    /// Tags to apply (Transmission folds these into the same label set as category).
    pub tags: Vec<String>,
    /// Whether the torrent should be added in a paused/stopped state.
    pub add_at_paused: bool,
}

/// Result of an add operation. Duplicates are reported as `success = true`
/// with the existing hash rather than as an error (§4.B).
#[derive(Debug, Clone)]
pub struct AddResult {
    /// Whether the downloader accepted (or already held) the torrent.
    pub success: bool,
    /// Info hash of the torrent, when known.
    pub hash: Option<String>,
    /// Downloader-assigned identifier, when distinct from the hash.
    pub id: Option<String>,
    /// Human-readable detail, mainly populated on failure.
    pub message: Option<String>,
}

/// Filter accepted by `ListTorrents`.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Restrict to torrents carrying this category.
    pub category: Option<String>,
    /// Restrict to torrents carrying this tag.
    pub tag: Option<String>,
}

/// A torrent as reported by the downloader.
#[derive(Debug, Clone)]
pub struct TorrentInfo {
    /// Info hash.
    pub hash: String,
    /// Display name.
    pub name: String,
    /// Category, if any.
    pub category: Option<String>,
    /// Tags, if any.
    pub tags: Vec<String>,
    /// Current state label as reported by the backend.
    pub state: String,
    /// Fraction of content downloaded, in `[0.0, 1.0]`.
    pub progress: f64,
    /// Total downloaded/uploaded bytes.
    pub size_bytes: u64,
    /// Upload/download ratio.
    pub ratio: f64,
    /// Seconds elapsed since the torrent last made progress.
    pub seconds_since_activity: Option<i64>,
    /// Hours the torrent has been seeding, when completed.
    pub seeding_hours: Option<f64>,
    /// Whether the torrent is currently paused/stopped.
    pub is_paused: bool,
    /// When the torrent was added to the downloader.
    pub added_at: Option<DateTime<Utc>>,
}

/// Downloader health/version summary (`GetStatus`/`GetVersion`).
#[derive(Debug, Clone)]
pub struct DownloaderStatus {
    /// Backend version string.
    pub version: String,
    /// Whether the downloader is currently reachable and authenticated.
    pub healthy: bool,
}

/// Sentinel returned by `GetFreeSpace` when the download path cannot be
/// resolved, chosen large enough that disk-protection backpressure never
/// misfires on an implementation that simply doesn't know.
pub const FREE_SPACE_UNKNOWN_SENTINEL_BYTES: u64 = u64::MAX / 2;
