//! Boundary trait for the external site collaborator.
//!
//! RSS/HTML parsing, HTTP transport, cookie jars, and `.torrent` download
//! for specific site schemas are explicit non-goals of this crate (they
//! live in site definition packs outside this workspace). `SiteClient` is
//! the capability surface the decision pipeline depends on instead,
//! mirroring `pt_downloader::DownloaderEngine`'s factory-registry pattern.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::model::{RssItem, TorrentDetail};

/// Errors a site collaborator implementation may report.
#[derive(Debug, Error)]
pub enum SiteError {
    /// The RSS feed could not be fetched or parsed.
    #[error("failed to fetch RSS for site '{site_name}'")]
    RssFetchFailed {
        /// Site the feed belongs to.
        site_name: String,
        /// Underlying transport/parse error.
        #[source]
        source: anyhow::Error,
    },
    /// The detail page for a torrent could not be fetched or parsed.
    #[error("failed to fetch detail for '{site_name}'/'{torrent_id}'")]
    DetailFetchFailed {
        /// Site the torrent belongs to.
        site_name: String,
        /// Site-local torrent identifier.
        torrent_id: String,
        /// Underlying transport/parse error.
        #[source]
        source: anyhow::Error,
    },
    /// The `.torrent` file could not be downloaded.
    #[error("failed to download torrent file for '{site_name}'/'{torrent_id}'")]
    TorrentDownloadFailed {
        /// Site the torrent belongs to.
        site_name: String,
        /// Site-local torrent identifier.
        torrent_id: String,
        /// Underlying transport error.
        #[source]
        source: anyhow::Error,
    },
    /// No collaborator is registered for the requested site.
    #[error("unknown site '{site_name}'")]
    UnknownSite {
        /// Name of the requested site.
        site_name: String,
    },
}

/// A single RSS feed together with the items it currently lists.
#[derive(Debug, Clone)]
pub struct RssFeed {
    /// Items currently published in the feed, newest first.
    pub items: Vec<RssItem>,
}

/// Capability surface for a private-tracker site. Implementations own
/// HTTP transport, cookie/session handling, and HTML/JSON parsing of that
/// site's specific schema.
#[async_trait]
pub trait SiteClient: Send + Sync {
    /// Fetch the current RSS feed for a subscription tag.
    async fn fetch_rss(&self, site_name: &str, tag: &str) -> Result<RssFeed, SiteError>;

    /// Fetch detail-page data for a single torrent.
    async fn fetch_detail(&self, site_name: &str, torrent_id: &str) -> Result<TorrentDetail, SiteError>;

    /// Download the raw `.torrent` file bytes for a torrent.
    async fn download_torrent(&self, site_name: &str, torrent_id: &str) -> Result<Vec<u8>, SiteError>;
}

/// Process-wide registry of site collaborators, keyed by site name,
/// mirroring `pt_downloader::Registry`.
#[derive(Default)]
pub struct SiteRegistry {
    clients: RwLock<HashMap<String, Arc<dyn SiteClient>>>,
}

impl SiteRegistry {
    /// Build an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collaborator for a site name, replacing any existing one.
    pub async fn register(&self, site_name: impl Into<String>, client: Arc<dyn SiteClient>) {
        self.clients.write().await.insert(site_name.into(), client);
    }

    /// Look up the collaborator registered for a site name.
    pub async fn get(&self, site_name: &str) -> Option<Arc<dyn SiteClient>> {
        self.clients.read().await.get(site_name).cloned()
    }

    /// Names of every currently registered site.
    pub async fn names(&self) -> Vec<String> {
        self.clients.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingSite {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SiteClient for RecordingSite {
        async fn fetch_rss(&self, site_name: &str, tag: &str) -> Result<RssFeed, SiteError> {
            self.calls.lock().unwrap().push(format!("rss:{site_name}:{tag}"));
            Ok(RssFeed { items: Vec::new() })
        }

        async fn fetch_detail(&self, site_name: &str, torrent_id: &str) -> Result<TorrentDetail, SiteError> {
            Err(SiteError::DetailFetchFailed {
                site_name: site_name.to_string(),
                torrent_id: torrent_id.to_string(),
                source: anyhow::anyhow!("boom"),
            })
        }

        async fn download_torrent(&self, site_name: &str, torrent_id: &str) -> Result<Vec<u8>, SiteError> {
            Err(SiteError::TorrentDownloadFailed {
                site_name: site_name.to_string(),
                torrent_id: torrent_id.to_string(),
                source: anyhow::anyhow!("boom"),
            })
        }
    }

    #[tokio::test]
    async fn fetch_rss_records_call() {
        let site = RecordingSite { calls: Mutex::new(Vec::new()) };
        let feed = site.fetch_rss("example", "movies").await.unwrap();
        assert!(feed.items.is_empty());
        assert_eq!(site.calls.lock().unwrap().as_slice(), ["rss:example:movies"]);
    }

    #[tokio::test]
    async fn detail_fetch_failure_is_typed() {
        let site = RecordingSite { calls: Mutex::new(Vec::new()) };
        let err = site.fetch_detail("example", "42").await.unwrap_err();
        assert!(matches!(err, SiteError::DetailFetchFailed { .. }));
    }
}
