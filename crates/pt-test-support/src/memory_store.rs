//! An in-memory `TorrentRecordStore` test double.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use pt_store::{PushOutcome, Result, TorrentRecord, TorrentRecordStore, UpsertTorrentInput};

/// An in-memory [`TorrentRecordStore`] keyed the same way the Postgres-backed
/// implementation is: `(site_name, torrent_id)`.
#[derive(Default)]
pub struct MemoryTorrentStore {
    records: Mutex<HashMap<(String, String), TorrentRecord>>,
    next_id: Mutex<i64>,
}

impl MemoryTorrentStore {
    /// Build an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> i64 {
        let mut next_id = self.next_id.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *next_id += 1;
        *next_id
    }
}

#[async_trait]
impl TorrentRecordStore for MemoryTorrentStore {
    async fn upsert_torrent(&self, input: UpsertTorrentInput) -> Result<TorrentRecord> {
        let key = (input.site_name.clone(), input.torrent_id.clone());
        let mut records = self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let record = if let Some(existing) = records.get(&key) {
            TorrentRecord {
                title: input.title,
                tag: input.tag,
                category: input.category,
                free_level: input.free_level,
                free_end_time: input.free_end_time,
                is_free: input.is_free,
                is_skipped: input.is_skipped,
                download_source: input.download_source.map(|source| source.as_str().to_string()),
                filter_rule_id: input.filter_rule_id,
                size_bytes: input.size_bytes,
                has_hr: input.has_hr,
                last_check_time: Utc::now(),
                ..existing.clone()
            }
        } else {
            TorrentRecord {
                id: self.allocate_id(),
                site_name: input.site_name,
                torrent_id: input.torrent_id,
                title: input.title,
                tag: input.tag,
                category: input.category,
                torrent_hash: None,
                free_level: input.free_level,
                free_end_time: input.free_end_time,
                is_free: input.is_free,
                is_skipped: input.is_skipped,
                is_downloaded: false,
                is_pushed: None,
                push_time: None,
                is_expired: false,
                last_check_time: Utc::now(),
                retry_count: 0,
                last_error: None,
                download_source: input.download_source.map(|source| source.as_str().to_string()),
                filter_rule_id: input.filter_rule_id,
                downloader_id: None,
                downloader_name: None,
                downloader_task_id: None,
                pause_on_free_end: false,
                size_bytes: input.size_bytes,
                has_hr: input.has_hr,
            }
        };
        records.insert(key, record.clone());
        Ok(record)
    }

    async fn get_by_site_and_id(&self, site_name: &str, torrent_id: &str) -> Result<Option<TorrentRecord>> {
        let records = self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(records.get(&(site_name.to_string(), torrent_id.to_string())).cloned())
    }

    async fn get_by_site_and_hash(&self, site_name: &str, hash: &str) -> Result<Option<TorrentRecord>> {
        let records = self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(records
            .values()
            .find(|record| record.site_name == site_name && record.torrent_hash.as_deref() == Some(hash))
            .cloned())
    }

    async fn mark_downloaded(
        &self,
        site_name: &str,
        torrent_id: &str,
        torrent_hash: Option<&str>,
        is_downloaded: bool,
    ) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(record) = records.get_mut(&(site_name.to_string(), torrent_id.to_string())) {
            record.torrent_hash = torrent_hash.map(str::to_string);
            record.is_downloaded = is_downloaded;
        }
        Ok(())
    }

    async fn mark_pushed(&self, site_name: &str, torrent_id: &str, outcome: PushOutcome) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(record) = records.get_mut(&(site_name.to_string(), torrent_id.to_string())) {
            record.is_pushed = Some(outcome.is_pushed);
            if outcome.is_pushed {
                record.push_time = Some(Utc::now());
            }
            record.downloader_id = outcome.downloader_id;
            record.downloader_name = outcome.downloader_name;
            record.downloader_task_id = outcome.downloader_task_id;
            record.pause_on_free_end = outcome.pause_on_free_end;
            record.last_error = outcome.last_error;
        }
        Ok(())
    }

    async fn increment_retry(&self, site_name: &str, torrent_id: &str, last_error: &str) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(record) = records.get_mut(&(site_name.to_string(), torrent_id.to_string())) {
            record.retry_count += 1;
            record.last_error = Some(last_error.to_string());
        }
        Ok(())
    }

    async fn mark_expired(&self, site_name: &str, torrent_id: &str, last_error: &str) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(record) = records.get_mut(&(site_name.to_string(), torrent_id.to_string())) {
            record.is_expired = true;
            record.last_error = Some(last_error.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input() -> UpsertTorrentInput {
        UpsertTorrentInput {
            site_name: "site".to_string(),
            torrent_id: "guid-1".to_string(),
            title: "Example".to_string(),
            tag: "movies".to_string(),
            category: "movies".to_string(),
            free_level: "none".to_string(),
            free_end_time: None,
            is_free: false,
            is_skipped: false,
            download_source: None,
            filter_rule_id: None,
            size_bytes: 1024,
            has_hr: false,
        }
    }

    #[tokio::test]
    async fn upsert_then_find_round_trips() {
        let store = MemoryTorrentStore::new();
        let record = store.upsert_torrent(sample_input()).await.unwrap();
        assert_eq!(record.site_name, "site");

        let found = store.get_by_site_and_id("site", "guid-1").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn second_upsert_updates_the_same_record() {
        let store = MemoryTorrentStore::new();
        let first = store.upsert_torrent(sample_input()).await.unwrap();

        let mut second_input = sample_input();
        second_input.title = "Updated".to_string();
        let second = store.upsert_torrent(second_input).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.title, "Updated");
    }

    #[tokio::test]
    async fn mark_downloaded_sets_hash_and_flag() {
        let store = MemoryTorrentStore::new();
        store.upsert_torrent(sample_input()).await.unwrap();
        store.mark_downloaded("site", "guid-1", Some("abc123"), true).await.unwrap();

        let record = store.get_by_site_and_id("site", "guid-1").await.unwrap().unwrap();
        assert_eq!(record.torrent_hash.as_deref(), Some("abc123"));
        assert!(record.is_downloaded);

        let by_hash = store.get_by_site_and_hash("site", "abc123").await.unwrap();
        assert!(by_hash.is_some());
    }

    #[tokio::test]
    async fn mark_expired_is_sticky() {
        let store = MemoryTorrentStore::new();
        store.upsert_torrent(sample_input()).await.unwrap();
        store.mark_expired("site", "guid-1", "window closed").await.unwrap();

        let record = store.get_by_site_and_id("site", "guid-1").await.unwrap().unwrap();
        assert!(record.is_expired);
        assert_eq!(record.last_error.as_deref(), Some("window closed"));
    }
}
