//! qBittorrent WebUI v2 backend (§4.B).
//!
//! Wire semantics (endpoint names, form fields, multipart upload shape,
//! cookie-based session) follow qBittorrent's WebUI API as used by real
//! client libraries; authentication is tracked via `reqwest`'s cookie jar
//! rather than a hand-rolled `Set-Cookie` parser.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use reqwest::{multipart, Client, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{DownloaderError, Result};
use crate::model::{AddOptions, AddResult, DownloaderStatus, ListFilter, TorrentInfo};
use crate::DownloaderEngine;

/// Connection parameters for a single qBittorrent WebUI instance.
#[derive(Debug, Clone)]
pub struct QbittorrentConfig {
    /// Registry name this handle is bound to.
    pub name: String,
    /// Base URL, e.g. `http://localhost:8080`.
    pub base_url: String,
    /// WebUI username.
    pub username: String,
    /// WebUI password.
    pub password: String,
}

/// `DownloaderEngine` implementation for qBittorrent's WebUI v2 API.
pub struct QbittorrentEngine {
    name: String,
    base_url: Url,
    username: String,
    password: String,
    client: Client,
    logged_in: AtomicBool,
}

impl QbittorrentEngine {
    /// Build an engine from `config`, constructing a dedicated cookie-aware
    /// HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if `config.base_url` is not a valid URL.
    pub fn new(config: QbittorrentConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|source| {
            DownloaderError::OperationFailed {
                operation: "parse_base_url",
                downloader_name: config.name.clone(),
                source: Box::new(source),
            }
        })?;
        let client = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|source| DownloaderError::OperationFailed {
                operation: "build_http_client",
                downloader_name: config.name.clone(),
                source: Box::new(source),
            })?;
        Ok(Self {
            name: config.name,
            base_url,
            username: config.username,
            password: config.password,
            client,
            logged_in: AtomicBool::new(false),
        })
    }

    /// Log in unless a prior call already established a session. Pass
    /// `force = true` to re-login regardless (used after a 403 response).
    async fn ensure_logged_in(&self, force: bool) -> Result<()> {
        if !force && self.logged_in.load(Ordering::Acquire) {
            return Ok(());
        }
        self.authenticate().await?;
        self.logged_in.store(true, Ordering::Release);
        Ok(())
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join("api/v2/")
            .and_then(|u| u.join(path))
            .map_err(|source| DownloaderError::OperationFailed {
                operation: "build_url",
                downloader_name: self.name.clone(),
                source: Box::new(source),
            })
    }

    fn op_failed(
        &self,
        operation: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> DownloaderError {
        DownloaderError::OperationFailed {
            operation,
            downloader_name: self.name.clone(),
            source: Box::new(source),
        }
    }
}

#[async_trait]
impl DownloaderEngine for QbittorrentEngine {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(downloader = %self.name))]
    async fn ping(&self) -> Result<()> {
        self.get_version().await.map(|_| ())
    }

    #[instrument(skip(self), fields(downloader = %self.name))]
    async fn authenticate(&self) -> Result<()> {
        let url = self.url("auth/login")?;
        let response = self
            .client
            .post(url)
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| self.op_failed("authenticate", e))?;

        if response.status() == StatusCode::FORBIDDEN {
            return Err(DownloaderError::AuthFailed {
                downloader_name: self.name.clone(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.op_failed("authenticate", e))?;
        if body.trim() != "Ok." {
            return Err(DownloaderError::AuthFailed {
                downloader_name: self.name.clone(),
            });
        }
        Ok(())
    }

    #[instrument(skip(self), fields(downloader = %self.name))]
    async fn get_version(&self) -> Result<String> {
        self.ensure_logged_in(false).await?;
        let url = self.url("app/version")?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.op_failed("get_version", e))?;
        response
            .text()
            .await
            .map_err(|e| self.op_failed("get_version", e))
    }

    #[instrument(skip(self), fields(downloader = %self.name))]
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

    #[instrument(skip(self), fields(downloader = %self.name))]
    async fn get_free_space(&self, _path: &str) -> Result<u64> {
        #[derive(Deserialize)]
        struct TransferInfo {
            #[serde(default)]
            free_space_on_disk: Option<u64>,
        }

        self.ensure_logged_in(false).await?;
        let url = self.url("sync/maindata")?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.op_failed("get_free_space", e))?;
        #[derive(Deserialize)]
        struct MainData {
            #[serde(default)]
            server_state: Option<TransferInfo>,
        }
        let body: MainData = response
            .json()
            .await
            .map_err(|e| self.op_failed("get_free_space", e))?;
        Ok(body
            .server_state
            .and_then(|s| s.free_space_on_disk)
            .unwrap_or(crate::model::FREE_SPACE_UNKNOWN_SENTINEL_BYTES))
    }

    #[instrument(skip(self), fields(downloader = %self.name))]
    async fn check_torrent_exists(&self, hash: &str) -> Result<bool> {
        Ok(self.get_torrent(hash).await?.is_some())
    }

    #[instrument(skip(self, bytes), fields(downloader = %self.name))]
    async fn add_torrent_file(&self, bytes: Vec<u8>, opts: AddOptions) -> Result<AddResult> {
        self.ensure_logged_in(false).await?;

        let url = self.url("torrents/add")?;
        let mut form = multipart::Form::new();
        if let Some(save_path) = &opts.save_path {
            form = form.text("savepath", save_path.clone());
        }
        if let Some(category) = &opts.category {
            form = form.text("category", category.clone());
        }
        if !opts.tags.is_empty() {
            form = form.text("tags", opts.tags.join(","));
        }
        if opts.add_at_paused {
            form = form.text("stopped", "true");
        }
        let part = multipart::Part::bytes(bytes)
            .file_name("upload.torrent")
            .mime_str("application/x-bittorrent")
            .map_err(|e| self.op_failed("add_torrent_file", e))?;
        form = form.part("torrents", part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.op_failed("add_torrent_file", e))?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            return Err(DownloaderError::AuthFailed {
                downloader_name: self.name.clone(),
            });
        }
        if status == StatusCode::UNSUPPORTED_MEDIA_TYPE {
            return Ok(AddResult {
                success: false,
                hash: None,
                id: None,
                message: Some("torrent file is invalid".to_string()),
            });
        }
        Ok(AddResult {
            success: true,
            hash: None,
            id: None,
            message: None,
        })
    }

    #[instrument(skip(self), fields(downloader = %self.name))]
    async fn add_torrent_url(&self, url_value: &str, opts: AddOptions) -> Result<AddResult> {
        self.ensure_logged_in(false).await?;
        let url = self.url("torrents/add")?;
        let mut form = vec![("urls".to_string(), url_value.to_string())];
        if let Some(save_path) = &opts.save_path {
            form.push(("savepath".to_string(), save_path.clone()));
        }
        if let Some(category) = &opts.category {
            form.push(("category".to_string(), category.clone()));
        }
        if !opts.tags.is_empty() {
            form.push(("tags".to_string(), opts.tags.join(",")));
        }
        if opts.add_at_paused {
            form.push(("stopped".to_string(), "true".to_string()));
        }

        let response = self
            .client
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(|e| self.op_failed("add_torrent_url", e))?;

        if response.status() == StatusCode::FORBIDDEN {
            return Err(DownloaderError::AuthFailed {
                downloader_name: self.name.clone(),
            });
        }
        Ok(AddResult {
            success: true,
            hash: None,
            id: None,
            message: None,
        })
    }

    #[instrument(skip(self), fields(downloader = %self.name))]
    async fn pause(&self, hash: &str) -> Result<()> {
        self.torrent_action("torrents/stop", hash).await
    }

    #[instrument(skip(self), fields(downloader = %self.name))]
    async fn resume(&self, hash: &str) -> Result<()> {
        self.torrent_action("torrents/start", hash).await
    }

    #[instrument(skip(self), fields(downloader = %self.name))]
    async fn remove(&self, hash: &str, delete_data: bool) -> Result<()> {
        self.ensure_logged_in(false).await?;
        let url = self.url("torrents/delete")?;
        self.client
            .post(url)
            .form(&[
                ("hashes", hash),
                ("deleteFiles", if delete_data { "true" } else { "false" }),
            ])
            .send()
            .await
            .map_err(|e| self.op_failed("remove", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(downloader = %self.name))]
    async fn list_torrents(&self, filter: ListFilter) -> Result<Vec<TorrentInfo>> {
        self.ensure_logged_in(false).await?;
        let url = self.url("torrents/info")?;
        let mut query = Vec::new();
        if let Some(category) = &filter.category {
            query.push(("category", category.clone()));
        }
        if let Some(tag) = &filter.tag {
            query.push(("tag", tag.clone()));
        }

        let response = self
            .client
            .get(url)
            .query(&query)
            .send()
            .await
            .map_err(|e| self.op_failed("list_torrents", e))?;

        let raw: Vec<RawTorrent> = response
            .json()
            .await
            .map_err(|e| self.op_failed("list_torrents", e))?;
        Ok(raw.into_iter().map(RawTorrent::into_torrent_info).collect())
    }

    #[instrument(skip(self), fields(downloader = %self.name))]
    async fn get_torrent(&self, hash: &str) -> Result<Option<TorrentInfo>> {
        self.ensure_logged_in(false).await?;
        let url = self.url("torrents/info")?;
        let response = self
            .client
            .get(url)
            .query(&[("hashes", hash)])
            .send()
            .await
            .map_err(|e| self.op_failed("get_torrent", e))?;
        let raw: Vec<RawTorrent> = response
            .json()
            .await
            .map_err(|e| self.op_failed("get_torrent", e))?;
        Ok(raw.into_iter().next().map(RawTorrent::into_torrent_info))
    }

    #[instrument(skip(self), fields(downloader = %self.name))]
    async fn close(&self) -> Result<()> {
        debug!("releasing qbittorrent session");
        Ok(())
    }
}

impl QbittorrentEngine {
    async fn torrent_action(&self, path: &'static str, hash: &str) -> Result<()> {
        self.ensure_logged_in(false).await?;
        let url = self.url(path)?;
        self.client
            .post(url)
            .form(&[("hashes", hash)])
            .send()
            .await
            .map_err(|e| self.op_failed("torrent_action", e))?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct RawTorrent {
    hash: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    tags: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    ratio: Option<f64>,
    #[serde(default)]
    last_activity: Option<i64>,
    #[serde(default)]
    seeding_time: Option<i64>,
    #[serde(default)]
    added_on: Option<i64>,
}

impl RawTorrent {
    #[allow(clippy::cast_precision_loss)]
    fn into_torrent_info(self) -> TorrentInfo {
        let state = self.state.unwrap_or_default();
        let is_paused = state.starts_with("paused") || state == "stoppedDL" || state == "stoppedUP";
        let seeding_hours = self.seeding_time.map(|secs| secs as f64 / 3600.0);
        TorrentInfo {
            hash: self.hash,
            name: self.name.unwrap_or_default(),
            category: self.category.filter(|c| !c.is_empty()),
            tags: self
                .tags
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            state,
            progress: self.progress.unwrap_or_default(),
            size_bytes: self.size.unwrap_or_default(),
            ratio: self.ratio.unwrap_or_default(),
            seconds_since_activity: self.last_activity,
            seeding_hours,
            is_paused,
            added_at: self
                .added_on
                .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_torrent_maps_paused_state() {
        let raw = RawTorrent {
            hash: "abc".to_string(),
            name: Some("movie".to_string()),
            category: Some(String::new()),
            tags: Some("a, b".to_string()),
            state: Some("pausedDL".to_string()),
            progress: Some(0.5),
            size: Some(100),
            ratio: Some(1.2),
            last_activity: Some(10),
            seeding_time: Some(7200),
            added_on: Some(0),
        };
        let info = raw.into_torrent_info();
        assert!(info.is_paused);
        assert_eq!(info.category, None);
        assert_eq!(info.tags, vec!["a".to_string(), "b".to_string()]);
        assert!((info.seeding_hours.unwrap() - 2.0).abs() < f64::EPSILON);
    }
}
