//! Process-wide downloader registry (§4.B).
//!
//! Holds one handle per configured downloader name, backed by a small
//! factory table keyed by [`DownloaderKind`]. Health is tracked per handle
//! and toggled off on any auth/transport failure; a lookup that misses falls
//! back to constructing an ad-hoc handle the caller is responsible for
//! closing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::{DownloaderError, Result};
use crate::model::{AddOptions, AddResult, DownloaderKind, DownloaderStatus, ListFilter, TorrentInfo};
use crate::qbittorrent::{QbittorrentConfig, QbittorrentEngine};
use crate::transmission::{TransmissionConfig, TransmissionEngine};
use crate::DownloaderEngine;

/// Parameters needed to construct a handle for any backend kind.
#[derive(Debug, Clone)]
pub struct DownloaderFactoryParams {
    /// Registry name this handle is bound to.
    pub name: String,
    /// Which backend to construct.
    pub kind: DownloaderKind,
    /// Base WebUI URL (qBittorrent) or RPC endpoint (Transmission).
    pub base_url: String,
    /// Login username.
    pub username: String,
    /// Login password.
    pub password: String,
}

fn build_engine(params: &DownloaderFactoryParams) -> Result<Arc<dyn DownloaderEngine>> {
    match params.kind {
        DownloaderKind::QBittorrent => {
            let engine = QbittorrentEngine::new(QbittorrentConfig {
                name: params.name.clone(),
                base_url: params.base_url.clone(),
                username: params.username.clone(),
                password: params.password.clone(),
            })?;
            Ok(Arc::new(engine))
        }
        DownloaderKind::Transmission => {
            let engine = TransmissionEngine::new(TransmissionConfig {
                name: params.name.clone(),
                rpc_url: params.base_url.clone(),
                username: Some(params.username.clone()).filter(|s| !s.is_empty()),
                password: Some(params.password.clone()).filter(|s| !s.is_empty()),
            })?;
            Ok(Arc::new(engine))
        }
    }
}

fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

/// A single registered (or ad-hoc) downloader, with health/activity
/// tracking layered over the raw [`DownloaderEngine`].
pub struct DownloaderHandle {
    engine: Arc<dyn DownloaderEngine>,
    healthy: AtomicBool,
    last_activity_epoch_seconds: AtomicI64,
    /// Ad-hoc handles (constructed on a registry miss) must be closed by the
    /// caller once done; registered handles are owned by the registry.
    pub needs_close: bool,
}

impl DownloaderHandle {
    fn new(engine: Arc<dyn DownloaderEngine>, needs_close: bool) -> Self {
        Self {
            engine,
            healthy: AtomicBool::new(true),
            last_activity_epoch_seconds: AtomicI64::new(now_epoch_seconds()),
            needs_close,
        }
    }

    /// Whether the last operation through this handle succeeded.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Unix timestamp of the last operation attempted through this handle.
    #[must_use]
    pub fn last_activity_epoch_seconds(&self) -> i64 {
        self.last_activity_epoch_seconds.load(Ordering::Acquire)
    }

    fn record<T>(&self, result: &Result<T>) {
        self.last_activity_epoch_seconds
            .store(now_epoch_seconds(), Ordering::Release);
        let ok = result.is_ok();
        self.healthy.store(ok, Ordering::Release);
        if !ok {
            warn!(downloader = %self.engine.name(), "downloader handle marked unhealthy");
        }
    }
}

#[async_trait]
impl DownloaderEngine for DownloaderHandle {
    fn name(&self) -> &str {
        self.engine.name()
    }

    async fn ping(&self) -> Result<()> {
        let result = self.engine.ping().await;
        self.record(&result);
        result
    }

    async fn authenticate(&self) -> Result<()> {
        let result = self.engine.authenticate().await;
        self.record(&result);
        result
    }

    async fn get_version(&self) -> Result<String> {
        let result = self.engine.get_version().await;
        self.record(&result);
        result
    }

    async fn get_status(&self) -> Result<DownloaderStatus> {
        let result = self.engine.get_status().await;
        self.record(&result);
        result
    }

    async fn get_free_space(&self, path: &str) -> Result<u64> {
        let result = self.engine.get_free_space(path).await;
        self.record(&result);
        result
    }

    async fn check_torrent_exists(&self, hash: &str) -> Result<bool> {
        let result = self.engine.check_torrent_exists(hash).await;
        self.record(&result);
        result
    }

    async fn add_torrent_file(&self, bytes: Vec<u8>, opts: AddOptions) -> Result<AddResult> {
        let result = self.engine.add_torrent_file(bytes, opts).await;
        self.record(&result);
        result
    }

    async fn add_torrent_url(&self, url: &str, opts: AddOptions) -> Result<AddResult> {
        let result = self.engine.add_torrent_url(url, opts).await;
        self.record(&result);
        result
    }

    async fn pause(&self, hash: &str) -> Result<()> {
        let result = self.engine.pause(hash).await;
        self.record(&result);
        result
    }

    async fn resume(&self, hash: &str) -> Result<()> {
        let result = self.engine.resume(hash).await;
        self.record(&result);
        result
    }

    async fn remove(&self, hash: &str, delete_data: bool) -> Result<()> {
        let result = self.engine.remove(hash, delete_data).await;
        self.record(&result);
        result
    }

    async fn list_torrents(&self, filter: ListFilter) -> Result<Vec<TorrentInfo>> {
        let result = self.engine.list_torrents(filter).await;
        self.record(&result);
        result
    }

    async fn get_torrent(&self, hash: &str) -> Result<Option<TorrentInfo>> {
        let result = self.engine.get_torrent(hash).await;
        self.record(&result);
        result
    }

    async fn close(&self) -> Result<()> {
        self.engine.close().await
    }
}

/// Process-wide `name -> handle` map with ad-hoc fallback construction.
#[derive(Default)]
pub struct Registry {
    handles: RwLock<HashMap<String, Arc<DownloaderHandle>>>,
}

impl Registry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Build a handle from `params` and register it under `params.name`,
    /// replacing any existing handle of the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be constructed (e.g. an
    /// invalid URL).
    pub async fn register(&self, params: &DownloaderFactoryParams) -> Result<Arc<DownloaderHandle>> {
        let engine = build_engine(params)?;
        let handle = Arc::new(DownloaderHandle::new(engine, false));
        self.handles
            .write()
            .await
            .insert(params.name.clone(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Drop the handle registered under `name`, if any.
    pub async fn deregister(&self, name: &str) {
        self.handles.write().await.remove(name);
    }

    /// Look up a registered handle by name.
    pub async fn get(&self, name: &str) -> Option<Arc<DownloaderHandle>> {
        self.handles.read().await.get(name).cloned()
    }

    /// Look up a registered handle by name, falling back to constructing an
    /// ad-hoc one from `fallback` on a miss. The caller must call
    /// [`DownloaderEngine::close`] on an ad-hoc handle (`needs_close = true`)
    /// once done with it, since the registry does not own it.
    ///
    /// # Errors
    ///
    /// Returns [`DownloaderError::UnknownDownloader`] only if `fallback` is
    /// `None`; otherwise surfaces construction failures from `fallback`.
    pub async fn get_or_ad_hoc(
        &self,
        name: &str,
        fallback: Option<&DownloaderFactoryParams>,
    ) -> Result<Arc<DownloaderHandle>> {
        if let Some(handle) = self.get(name).await {
            return Ok(handle);
        }
        let params = fallback.ok_or_else(|| DownloaderError::UnknownDownloader {
            name: name.to_string(),
        })?;
        let engine = build_engine(params)?;
        Ok(Arc::new(DownloaderHandle::new(engine, true)))
    }

    /// Names of all currently registered handles.
    pub async fn names(&self) -> Vec<String> {
        self.handles.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysOkEngine;

    #[async_trait]
    impl DownloaderEngine for AlwaysOkEngine {
        fn name(&self) -> &str {
            "always-ok"
        }
        async fn ping(&self) -> Result<()> {
            Ok(())
        }
        async fn authenticate(&self) -> Result<()> {
            Ok(())
        }
        async fn get_version(&self) -> Result<String> {
            Ok("1.0".to_string())
        }
        async fn get_status(&self) -> Result<DownloaderStatus> {
            Ok(DownloaderStatus {
                version: "1.0".to_string(),
                healthy: true,
            })
        }
        async fn get_free_space(&self, _path: &str) -> Result<u64> {
            Ok(1)
        }
        async fn check_torrent_exists(&self, _hash: &str) -> Result<bool> {
            Ok(false)
        }
        async fn add_torrent_file(&self, _bytes: Vec<u8>, _opts: AddOptions) -> Result<AddResult> {
            Ok(AddResult {
                success: true,
                hash: None,
                id: None,
                message: None,
            })
        }
        async fn add_torrent_url(&self, _url: &str, _opts: AddOptions) -> Result<AddResult> {
            Ok(AddResult {
                success: true,
                hash: None,
                id: None,
                message: None,
            })
        }
        async fn pause(&self, _hash: &str) -> Result<()> {
            Ok(())
        }
        async fn resume(&self, _hash: &str) -> Result<()> {
            Ok(())
        }
        async fn remove(&self, _hash: &str, _delete_data: bool) -> Result<()> {
            Ok(())
        }
        async fn list_torrents(&self, _filter: ListFilter) -> Result<Vec<TorrentInfo>> {
            Ok(Vec::new())
        }
        async fn get_torrent(&self, _hash: &str) -> Result<Option<TorrentInfo>> {
            Ok(None)
        }
    }

    struct AlwaysFailEngine;

    #[async_trait]
    impl DownloaderEngine for AlwaysFailEngine {
        fn name(&self) -> &str {
            "always-fail"
        }
        async fn ping(&self) -> Result<()> {
            Err(DownloaderError::AuthFailed {
                downloader_name: "always-fail".to_string(),
            })
        }
        async fn authenticate(&self) -> Result<()> {
            self.ping().await
        }
        async fn get_version(&self) -> Result<String> {
            Err(DownloaderError::AuthFailed {
                downloader_name: "always-fail".to_string(),
            })
        }
        async fn get_status(&self) -> Result<DownloaderStatus> {
            Err(DownloaderError::AuthFailed {
                downloader_name: "always-fail".to_string(),
            })
        }
        async fn get_free_space(&self, _path: &str) -> Result<u64> {
            Err(DownloaderError::AuthFailed {
                downloader_name: "always-fail".to_string(),
            })
        }
        async fn check_torrent_exists(&self, _hash: &str) -> Result<bool> {
            Err(DownloaderError::AuthFailed {
                downloader_name: "always-fail".to_string(),
            })
        }
        async fn add_torrent_file(&self, _bytes: Vec<u8>, _opts: AddOptions) -> Result<AddResult> {
            Err(DownloaderError::AuthFailed {
                downloader_name: "always-fail".to_string(),
            })
        }
        async fn add_torrent_url(&self, _url: &str, _opts: AddOptions) -> Result<AddResult> {
            Err(DownloaderError::AuthFailed {
                downloader_name: "always-fail".to_string(),
            })
        }
        async fn pause(&self, _hash: &str) -> Result<()> {
            Err(DownloaderError::AuthFailed {
                downloader_name: "always-fail".to_string(),
            })
        }
        async fn resume(&self, _hash: &str) -> Result<()> {
            Err(DownloaderError::AuthFailed {
                downloader_name: "always-fail".to_string(),
            })
        }
        async fn remove(&self, _hash: &str, _delete_data: bool) -> Result<()> {
            Err(DownloaderError::AuthFailed {
                downloader_name: "always-fail".to_string(),
            })
        }
        async fn list_torrents(&self, _filter: ListFilter) -> Result<Vec<TorrentInfo>> {
            Err(DownloaderError::AuthFailed {
                downloader_name: "always-fail".to_string(),
            })
        }
        async fn get_torrent(&self, _hash: &str) -> Result<Option<TorrentInfo>> {
            Err(DownloaderError::AuthFailed {
                downloader_name: "always-fail".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn handle_toggles_unhealthy_on_failure() {
        let handle = DownloaderHandle::new(Arc::new(AlwaysOkEngine), false);
        assert!(handle.is_healthy());
        handle.ping().await.unwrap();
        assert!(handle.is_healthy());

        let failing = DownloaderHandle::new(Arc::new(AlwaysFailEngine), false);
        assert!(failing.ping().await.is_err());
        assert!(!failing.is_healthy());
    }

    #[tokio::test]
    async fn get_or_ad_hoc_falls_back_on_miss() {
        let registry = Registry::new();
        let result = registry.get_or_ad_hoc("missing", None).await;
        assert!(matches!(result, Err(DownloaderError::UnknownDownloader { .. })));
    }

    #[tokio::test]
    async fn register_then_get_round_trips() {
        let registry = Registry::new();
        let params = DownloaderFactoryParams {
            name: "qb-main".to_string(),
            kind: DownloaderKind::QBittorrent,
            base_url: "http://localhost:8080".to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
        };
        registry.register(&params).await.unwrap();
        assert!(registry.get("qb-main").await.is_some());
        assert_eq!(registry.names().await, vec!["qb-main".to_string()]);
        registry.deregister("qb-main").await;
        assert!(registry.get("qb-main").await.is_none());
    }
}
