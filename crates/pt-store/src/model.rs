//! The torrent record domain type and its database row.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Where a torrent's download authorization came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadSource {
    /// Authorized because the item was free and finishable within the window.
    FreeDownload,
    /// Authorized because a filter rule matched.
    FilterRule,
}

impl DownloadSource {
    /// Stored string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FreeDownload => "free_download",
            Self::FilterRule => "filter_rule",
        }
    }

    /// Parse the stored string representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "free_download" => Some(Self::FreeDownload),
            "filter_rule" => Some(Self::FilterRule),
            _ => None,
        }
    }
}

/// A torrent tracked by the store, keyed uniquely by `(site_name, torrent_id)`.
#[derive(Debug, Clone, FromRow)]
pub struct TorrentRecord {
    /// Surrogate identifier.
    pub id: i64,
    /// Site the torrent came from.
    pub site_name: String,
    /// Site-assigned GUID for the RSS item.
    pub torrent_id: String,
    /// Item title at the time it was last seen.
    pub title: String,
    /// Tag used to derive the download subpath.
    pub tag: String,
    /// Category applied to the downloaded torrent.
    pub category: String,
    /// Info hash, set once the `.torrent` file has been fetched.
    pub torrent_hash: Option<String>,
    /// Site-specific free-level label.
    pub free_level: String,
    /// When the free window closes, if the item is free.
    pub free_end_time: Option<DateTime<Utc>>,
    /// Whether the item is currently free.
    pub is_free: bool,
    /// Whether the decision pipeline chose to skip this item.
    pub is_skipped: bool,
    /// Whether the `.torrent` file has been fetched to disk.
    pub is_downloaded: bool,
    /// `None` until a push attempt has been made.
    pub is_pushed: Option<bool>,
    /// When the torrent was successfully pushed to a downloader.
    pub push_time: Option<DateTime<Utc>>,
    /// Set once a free item has been observed past its free window; sticky.
    pub is_expired: bool,
    /// Last time the decision pipeline examined this item.
    pub last_check_time: DateTime<Utc>,
    /// Push retry attempts so far.
    pub retry_count: i32,
    /// Last error message recorded against this record, if any.
    pub last_error: Option<String>,
    /// `"free_download"` or `"filter_rule"`.
    pub download_source: Option<String>,
    /// Filter rule that authorized the download, when `download_source = "filter_rule"`.
    pub filter_rule_id: Option<i64>,
    /// Downloader the torrent was pushed to.
    pub downloader_id: Option<i64>,
    /// Downloader display name, captured at push time.
    pub downloader_name: Option<String>,
    /// Task identifier in the downloader (usually the info hash).
    pub downloader_task_id: Option<String>,
    /// Whether the torrent should be paused when its free window closes.
    pub pause_on_free_end: bool,
    /// Size of the torrent's content in bytes.
    pub size_bytes: i64,
    /// Whether the site marks this torrent as Hit & Run.
    pub has_hr: bool,
}

impl TorrentRecord {
    /// Parsed [`DownloadSource`], if set and recognized.
    #[must_use]
    pub fn download_source(&self) -> Option<DownloadSource> {
        self.download_source.as_deref().and_then(DownloadSource::parse)
    }

    /// §3 invariant: a record is past its free window and must never un-expire.
    #[must_use]
    pub fn effective_expired(&self) -> bool {
        self.is_expired
            || self
                .free_end_time
                .is_some_and(|end| self.is_free && Utc::now() > end)
    }
}
