//! Transmission JSON-RPC backend (§4.B).
//!
//! Talks to a real Transmission daemon through the `transmission-rpc` crate.
//! Transmission has no category concept; category and tags are folded into
//! the same label set, same as Transmission's own label support.

use async_trait::async_trait;
use chrono::DateTime;
use transmission_rpc::types::{
    BasicAuth, Id, Torrent, TorrentAction, TorrentAddArgs, TorrentGetField,
    TorrentAddedOrDuplicate, TorrentStatus,
};
use transmission_rpc::TransClient;

use crate::error::{DownloaderError, Result};
use crate::model::{
    AddOptions, AddResult, DownloaderStatus, ListFilter, TorrentInfo,
    FREE_SPACE_UNKNOWN_SENTINEL_BYTES,
};
use crate::DownloaderEngine;

/// Connection parameters for a single Transmission daemon.
#[derive(Debug, Clone)]
pub struct TransmissionConfig {
    /// Registry name this handle is bound to.
    pub name: String,
    /// RPC endpoint, e.g. `http://localhost:9091/transmission/rpc`.
    pub rpc_url: String,
    /// Optional basic-auth username.
    pub username: Option<String>,
    /// Optional basic-auth password.
    pub password: Option<String>,
}

/// `DownloaderEngine` implementation for Transmission's JSON-RPC API.
pub struct TransmissionEngine {
    name: String,
    client: TransClient,
}

impl TransmissionEngine {
    /// Build an engine from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config.rpc_url` is not a valid URL.
    pub fn new(config: TransmissionConfig) -> Result<Self> {
        let url = config
            .rpc_url
            .parse()
            .map_err(|source| DownloaderError::OperationFailed {
                operation: "parse_rpc_url",
                downloader_name: config.name.clone(),
                source: Box::new(source),
            })?;
        let client = match (config.username, config.password) {
            (Some(user), Some(password)) => {
                TransClient::with_auth(url, BasicAuth { user, password })
            }
            _ => TransClient::new(url),
        };
        Ok(Self {
            name: config.name,
            client,
        })
    }

    fn op_failed(
        &self,
        operation: &'static str,
        source: impl std::fmt::Display,
    ) -> DownloaderError {
        DownloaderError::OperationFailed {
            operation,
            downloader_name: self.name.clone(),
            source: Box::new(std::io::Error::other(source.to_string())),
        }
    }

    fn combined_labels(opts: &AddOptions) -> Vec<String> {
        let mut labels = Vec::new();
        if let Some(category) = &opts.category {
            labels.push(category.clone());
        }
        labels.extend(opts.tags.iter().cloned());
        labels
    }

    async fn torrent_action(&self, hash: &str, action: TorrentAction) -> Result<()> {
        let response = self
            .client
            .torrent_action(action, vec![Id::Hash(hash.to_string())])
            .await
            .map_err(|e| self.op_failed("torrent_action", e))?;
        if !response.is_ok() {
            return Err(self.op_failed("torrent_action", response.result));
        }
        Ok(())
    }
}

#[async_trait]
impl DownloaderEngine for TransmissionEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ping(&self) -> Result<()> {
        self.get_version().await.map(|_| ())
    }

    async fn authenticate(&self) -> Result<()> {
        // Transmission authenticates per-request via `X-Transmission-Session-Id`,
        // which `transmission-rpc` negotiates transparently on first call.
        self.ping().await
    }

    async fn get_version(&self) -> Result<String> {
        let response = self
            .client
            .session_get()
            .await
            .map_err(|e| self.op_failed("get_version", e))?;
        if !response.is_ok() {
            return Err(self.op_failed("get_version", response.result));
        }
        Ok(response.arguments.version)
    }

    async fn get_status(&self) -> Result<DownloaderStatus> {
        match self.get_version().await {
            Ok(version) => Ok(DownloaderStatus {
                version,
                healthy: true,
            }),
            Err(_) => Ok(DownloaderStatus {
                version: String::new(),
                healthy: false,
            }),
        }
    }

    async fn get_free_space(&self, path: &str) -> Result<u64> {
        let response = self
            .client
            .free_space(path.to_string())
            .await
            .map_err(|e| self.op_failed("get_free_space", e))?;
        if !response.is_ok() {
            return Ok(FREE_SPACE_UNKNOWN_SENTINEL_BYTES);
        }
        Ok(response.arguments.size_bytes)
    }

    async fn check_torrent_exists(&self, hash: &str) -> Result<bool> {
        Ok(self.get_torrent(hash).await?.is_some())
    }

    async fn add_torrent_file(&self, bytes: Vec<u8>, opts: AddOptions) -> Result<AddResult> {
        use base64::Engine as _;
        let metainfo = base64::engine::general_purpose::STANDARD.encode(bytes);
        let args = TorrentAddArgs {
            metainfo: Some(metainfo),
            download_dir: opts.save_path.clone(),
            paused: Some(opts.add_at_paused),
            labels: Some(Self::combined_labels(&opts)),
            ..TorrentAddArgs::default()
        };
        self.submit_add(args).await
    }

    async fn add_torrent_url(&self, url: &str, opts: AddOptions) -> Result<AddResult> {
        let args = TorrentAddArgs {
            filename: Some(url.to_string()),
            download_dir: opts.save_path.clone(),
            paused: Some(opts.add_at_paused),
            labels: Some(Self::combined_labels(&opts)),
            ..TorrentAddArgs::default()
        };
        self.submit_add(args).await
    }

    async fn pause(&self, hash: &str) -> Result<()> {
        self.torrent_action(hash, TorrentAction::Stop).await
    }

    async fn resume(&self, hash: &str) -> Result<()> {
        self.torrent_action(hash, TorrentAction::Start).await
    }

    async fn remove(&self, hash: &str, delete_data: bool) -> Result<()> {
        let response = self
            .client
            .torrent_remove(vec![Id::Hash(hash.to_string())], delete_data)
            .await
            .map_err(|e| self.op_failed("remove", e))?;
        if !response.is_ok() {
            return Err(self.op_failed("remove", response.result));
        }
        Ok(())
    }

    async fn list_torrents(&self, filter: ListFilter) -> Result<Vec<TorrentInfo>> {
        let response = self
            .client
            .torrent_get(Some(torrent_fields()), None)
            .await
            .map_err(|e| self.op_failed("list_torrents", e))?;
        if !response.is_ok() {
            return Err(self.op_failed("list_torrents", response.result));
        }
        Ok(response
            .arguments
            .torrents
            .into_iter()
            .map(torrent_to_info)
            .filter(|info| matches_filter(info, &filter))
            .collect())
    }

    async fn get_torrent(&self, hash: &str) -> Result<Option<TorrentInfo>> {
        let response = self
            .client
            .torrent_get(
                Some(torrent_fields()),
                Some(vec![Id::Hash(hash.to_string())]),
            )
            .await
            .map_err(|e| self.op_failed("get_torrent", e))?;
        if !response.is_ok() {
            return Err(self.op_failed("get_torrent", response.result));
        }
        Ok(response.arguments.torrents.into_iter().next().map(torrent_to_info))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

impl TransmissionEngine {
    async fn submit_add(&self, args: TorrentAddArgs) -> Result<AddResult> {
        let response = self
            .client
            .torrent_add(args)
            .await
            .map_err(|e| self.op_failed("add_torrent", e))?;
        if !response.is_ok() {
            return Err(self.op_failed("add_torrent", response.result));
        }
        Ok(match response.arguments {
            TorrentAddedOrDuplicate::TorrentAdded(torrent) => AddResult {
                success: true,
                hash: torrent.hash_string,
                id: torrent.id.map(|id| id.to_string()),
                message: None,
            },
            TorrentAddedOrDuplicate::TorrentDuplicate(torrent) => AddResult {
                success: true,
                hash: torrent.hash_string,
                id: torrent.id.map(|id| id.to_string()),
                message: Some("torrent already present".to_string()),
            },
            TorrentAddedOrDuplicate::Error => AddResult {
                success: false,
                hash: None,
                id: None,
                message: Some("transmission reported an add error".to_string()),
            },
        })
    }
}

fn torrent_fields() -> Vec<TorrentGetField> {
    vec![
        TorrentGetField::HashString,
        TorrentGetField::Name,
        TorrentGetField::Labels,
        TorrentGetField::Status,
        TorrentGetField::PercentDone,
        TorrentGetField::SizeWhenDone,
        TorrentGetField::UploadRatio,
        TorrentGetField::ActivityDate,
        TorrentGetField::SecondsSeeding,
        TorrentGetField::AddedDate,
    ]
}

#[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
fn torrent_to_info(torrent: Torrent) -> TorrentInfo {
    let labels = torrent.labels.unwrap_or_default();
    let is_paused = matches!(torrent.status, Some(TorrentStatus::Stopped));
    TorrentInfo {
        hash: torrent.hash_string.unwrap_or_default(),
        name: torrent.name.unwrap_or_default(),
        category: labels.first().cloned(),
        tags: labels,
        state: torrent
            .status
            .map(|s| format!("{s:?}"))
            .unwrap_or_default(),
        progress: f64::from(torrent.percent_done.unwrap_or_default()),
        size_bytes: torrent.size_when_done.unwrap_or_default().max(0) as u64,
        ratio: f64::from(torrent.upload_ratio.unwrap_or_default()),
        seconds_since_activity: torrent.activity_date,
        seeding_hours: torrent
            .seconds_seeding
            .map(|secs| secs as f64 / 3600.0),
        is_paused,
        added_at: torrent
            .added_date
            .and_then(|ts| DateTime::from_timestamp(ts, 0)),
    }
}

fn matches_filter(info: &TorrentInfo, filter: &ListFilter) -> bool {
    if let Some(category) = &filter.category {
        if info.category.as_deref() != Some(category.as_str()) {
            return false;
        }
    }
    if let Some(tag) = &filter.tag {
        if !info.tags.iter().any(|t| t == tag) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_labels_folds_category_and_tags() {
        let opts = AddOptions {
            category: Some("movies".to_string()),
            tags: vec!["1080p".to_string(), "hr".to_string()],
            ..AddOptions::default()
        };
        let labels = TransmissionEngine::combined_labels(&opts);
        assert_eq!(labels, vec!["movies", "1080p", "hr"]);
    }

    #[test]
    fn matches_filter_checks_category_and_tag() {
        let info = TorrentInfo {
            hash: "abc".to_string(),
            name: "name".to_string(),
            category: Some("movies".to_string()),
            tags: vec!["hr".to_string()],
            state: "Downloading".to_string(),
            progress: 0.0,
            size_bytes: 0,
            ratio: 0.0,
            seconds_since_activity: None,
            seeding_hours: None,
            is_paused: false,
            added_at: None,
        };
        assert!(matches_filter(
            &info,
            &ListFilter {
                category: Some("movies".to_string()),
                tag: None,
            }
        ));
        assert!(!matches_filter(
            &info,
            &ListFilter {
                category: Some("tv".to_string()),
                tag: None,
            }
        ));
    }
}
