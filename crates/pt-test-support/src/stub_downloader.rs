//! A `DownloaderEngine` test double that records every call it receives
//! and can be configured to fail on demand.

use std::sync::Mutex;

use async_trait::async_trait;
use pt_downloader::{AddOptions, AddResult, DownloaderEngine, DownloaderError, DownloaderStatus, ListFilter, Result, TorrentInfo};

/// Records calls against a `StubDownloaderEngine` in the order they happened.
pub type CallLog = Vec<String>;

/// A configurable `DownloaderEngine` double for tests that exercise the
/// push worker, free-end monitor, or cleanup engine without a live backend.
pub struct StubDownloaderEngine {
    name: String,
    calls: Mutex<CallLog>,
    torrents: Mutex<Vec<TorrentInfo>>,
    fail_operations: Mutex<Vec<String>>,
    free_space_bytes: u64,
}

impl StubDownloaderEngine {
    /// Build a stub with no seeded torrents and nothing configured to fail.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: Mutex::new(Vec::new()),
            torrents: Mutex::new(Vec::new()),
            fail_operations: Mutex::new(Vec::new()),
            free_space_bytes: u64::MAX / 2,
        }
    }

    /// Seed the torrents `list_torrents`/`get_torrent`/`check_torrent_exists`
    /// will report.
    pub fn seed_torrents(&self, torrents: Vec<TorrentInfo>) {
        *self.torrents.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = torrents;
    }

    /// Make the named operation fail on its next invocation (and every
    /// invocation thereafter, until `seed_torrents`/a fresh stub resets it).
    pub fn fail_on(&self, operation: &str) {
        self.fail_operations.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(operation.to_string());
    }

    /// Calls received so far, in order.
    #[must_use]
    pub fn calls(&self) -> CallLog {
        self.calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    fn record(&self, operation: &str) {
        self.calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(operation.to_string());
    }

    fn should_fail(&self, operation: &str) -> bool {
        self.fail_operations.lock().unwrap_or_else(std::sync::PoisonError::into_inner).iter().any(|op| op == operation)
    }

    fn failure(&self, operation: &'static str) -> DownloaderError {
        DownloaderError::OperationFailed {
            operation,
            downloader_name: self.name.clone(),
            source: Box::new(std::io::Error::other("stub configured to fail")),
        }
    }
}

#[async_trait]
impl DownloaderEngine for StubDownloaderEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ping(&self) -> Result<()> {
        self.record("ping");
        if self.should_fail("ping") { return Err(self.failure("ping")); }
        Ok(())
    }

    async fn authenticate(&self) -> Result<()> {
        self.record("authenticate");
        if self.should_fail("authenticate") { return Err(self.failure("authenticate")); }
        Ok(())
    }

    async fn get_version(&self) -> Result<String> {
        self.record("get_version");
        if self.should_fail("get_version") { return Err(self.failure("get_version")); }
        Ok("stub-1.0".to_string())
    }

    async fn get_status(&self) -> Result<DownloaderStatus> {
        self.record("get_status");
        if self.should_fail("get_status") { return Err(self.failure("get_status")); }
        Ok(DownloaderStatus { version: "stub-1.0".to_string(), healthy: true })
    }

    async fn get_free_space(&self, _path: &str) -> Result<u64> {
        self.record("get_free_space");
        if self.should_fail("get_free_space") { return Err(self.failure("get_free_space")); }
        Ok(self.free_space_bytes)
    }

    async fn check_torrent_exists(&self, hash: &str) -> Result<bool> {
        self.record("check_torrent_exists");
        if self.should_fail("check_torrent_exists") { return Err(self.failure("check_torrent_exists")); }
        Ok(self.torrents.lock().unwrap_or_else(std::sync::PoisonError::into_inner).iter().any(|t| t.hash == hash))
    }

    async fn add_torrent_file(&self, bytes: Vec<u8>, _opts: AddOptions) -> Result<AddResult> {
        self.record("add_torrent_file");
        if self.should_fail("add_torrent_file") { return Err(self.failure("add_torrent_file")); }
        let hash = pt_downloader::info_hash::compute_info_hash(&bytes)?;
        Ok(AddResult { success: true, hash: Some(hash.clone()), id: Some(hash), message: None })
    }

    async fn add_torrent_url(&self, _url: &str, _opts: AddOptions) -> Result<AddResult> {
        self.record("add_torrent_url");
        if self.should_fail("add_torrent_url") { return Err(self.failure("add_torrent_url")); }
        Ok(AddResult { success: true, hash: None, id: None, message: None })
    }

    async fn pause(&self, hash: &str) -> Result<()> {
        self.record("pause");
        if self.should_fail("pause") { return Err(self.failure("pause")); }
        let _ = hash;
        Ok(())
    }

    async fn resume(&self, hash: &str) -> Result<()> {
        self.record("resume");
        if self.should_fail("resume") { return Err(self.failure("resume")); }
        let _ = hash;
        Ok(())
    }

    async fn remove(&self, hash: &str, _delete_data: bool) -> Result<()> {
        self.record("remove");
        if self.should_fail("remove") { return Err(self.failure("remove")); }
        self.torrents.lock().unwrap_or_else(std::sync::PoisonError::into_inner).retain(|t| t.hash != hash);
        Ok(())
    }

    async fn list_torrents(&self, _filter: ListFilter) -> Result<Vec<TorrentInfo>> {
        self.record("list_torrents");
        if self.should_fail("list_torrents") { return Err(self.failure("list_torrents")); }
        Ok(self.torrents.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone())
    }

    async fn get_torrent(&self, hash: &str) -> Result<Option<TorrentInfo>> {
        self.record("get_torrent");
        if self.should_fail("get_torrent") { return Err(self.failure("get_torrent")); }
        Ok(self.torrents.lock().unwrap_or_else(std::sync::PoisonError::into_inner).iter().find(|t| t.hash == hash).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_torrent(hash: &str) -> TorrentInfo {
        TorrentInfo {
            hash: hash.to_string(),
            name: "sample".to_string(),
            category: None,
            tags: Vec::new(),
            state: "seeding".to_string(),
            progress: 1.0,
            size_bytes: 0,
            ratio: 0.0,
            seconds_since_activity: Some(0),
            seeding_hours: Some(0.0),
            is_paused: false,
            added_at: None,
        }
    }

    #[tokio::test]
    async fn records_calls_in_order() {
        let engine = StubDownloaderEngine::new("stub");
        let _ = engine.ping().await;
        let _ = engine.get_version().await;
        assert_eq!(engine.calls(), vec!["ping".to_string(), "get_version".to_string()]);
    }

    #[tokio::test]
    async fn fail_on_forces_an_error() {
        let engine = StubDownloaderEngine::new("stub");
        engine.fail_on("ping");
        assert!(engine.ping().await.is_err());
    }

    #[tokio::test]
    async fn seeded_torrents_are_found_by_hash() {
        let engine = StubDownloaderEngine::new("stub");
        engine.seed_torrents(vec![sample_torrent("abc")]);
        assert!(engine.check_torrent_exists("abc").await.unwrap());
        assert!(!engine.check_torrent_exists("zzz").await.unwrap());
    }

    #[tokio::test]
    async fn remove_drops_the_matching_torrent() {
        let engine = StubDownloaderEngine::new("stub");
        engine.seed_torrents(vec![sample_torrent("abc")]);
        engine.remove("abc", false).await.unwrap();
        assert!(engine.list_torrents(ListFilter::default()).await.unwrap().is_empty());
    }
}
