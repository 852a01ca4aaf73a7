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

//! Torrent record store: §4.C upsert/find semantics over the `torrent_info`
//! table.
//!
//! This crate carries its own migrator on top of `pt-data`'s: running
//! [`TorrentStore::connect`] brings `schema_meta.version` from `2` to `3`.

pub mod error;
pub mod model;

pub use error::{Result, StoreError};
pub use model::{DownloadSource, TorrentRecord};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Embedded migrations for the `torrent_info` table.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Fields accepted by [`TorrentRecordStore::upsert_torrent`].
///
/// Mirrors the columns the decision pipeline (§4.D step 6) is authorized to
/// write on both insert and update.
#[derive(Debug, Clone)]
pub struct UpsertTorrentInput {
    /// Originating site.
    pub site_name: String,
    /// Site-assigned GUID for the RSS item.
    pub torrent_id: String,
    /// Item title.
    pub title: String,
    /// Tag used to derive the download subpath.
    pub tag: String,
    /// Category applied to the downloaded torrent.
    pub category: String,
    /// Site-specific free-level label.
    pub free_level: String,
    /// When the free window closes, if free.
    pub free_end_time: Option<DateTime<Utc>>,
    /// Whether the item is currently free.
    pub is_free: bool,
    /// Whether the decision pipeline skipped this item.
    pub is_skipped: bool,
    /// `"free_download"` or `"filter_rule"`, unset when skipped.
    pub download_source: Option<DownloadSource>,
    /// Filter rule that authorized the download, when applicable.
    pub filter_rule_id: Option<i64>,
    /// Size of the torrent's content in bytes.
    pub size_bytes: i64,
    /// Whether the site marks this torrent as Hit & Run.
    pub has_hr: bool,
}

const UPSERT_TORRENT: &str = r"
    INSERT INTO torrent_info (
        site_name, torrent_id, title, tag, category, free_level, free_end_time,
        is_free, is_skipped, download_source, filter_rule_id, size_bytes, has_hr,
        last_check_time
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, now())
    ON CONFLICT (site_name, torrent_id) DO UPDATE SET
        title = EXCLUDED.title,
        tag = EXCLUDED.tag,
        category = EXCLUDED.category,
        free_level = EXCLUDED.free_level,
        free_end_time = EXCLUDED.free_end_time,
        is_free = EXCLUDED.is_free,
        is_skipped = EXCLUDED.is_skipped,
        download_source = EXCLUDED.download_source,
        filter_rule_id = EXCLUDED.filter_rule_id,
        size_bytes = EXCLUDED.size_bytes,
        has_hr = EXCLUDED.has_hr,
        last_check_time = now()
    RETURNING *
";

const SELECT_BY_SITE_AND_ID: &str = "SELECT * FROM torrent_info WHERE site_name = $1 AND torrent_id = $2";

const SELECT_BY_SITE_AND_HASH: &str = "SELECT * FROM torrent_info WHERE site_name = $1 AND torrent_hash = $2";

const MARK_DOWNLOADED: &str = r"
    UPDATE torrent_info SET torrent_hash = $3, is_downloaded = $4
    WHERE site_name = $1 AND torrent_id = $2
";

const MARK_PUSHED: &str = r"
    UPDATE torrent_info SET
        is_pushed = $3,
        push_time = CASE WHEN $3 THEN now() ELSE push_time END,
        downloader_id = $4,
        downloader_name = $5,
        downloader_task_id = $6,
        pause_on_free_end = $7,
        last_error = $8
    WHERE site_name = $1 AND torrent_id = $2
";

const INCREMENT_RETRY: &str = r"
    UPDATE torrent_info SET retry_count = retry_count + 1, last_error = $3
    WHERE site_name = $1 AND torrent_id = $2
";

const MARK_EXPIRED: &str = r"
    UPDATE torrent_info SET is_expired = TRUE, last_error = $3
    WHERE site_name = $1 AND torrent_id = $2
";

/// §4.C contract: upsert/find semantics the core consumes, independent of
/// the backing implementation.
#[async_trait]
pub trait TorrentRecordStore: Send + Sync {
    /// Insert or update the record keyed by `(site_name, torrent_id)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn upsert_torrent(&self, input: UpsertTorrentInput) -> Result<TorrentRecord>;

    /// Look up a record by its natural key.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    async fn get_by_site_and_id(
        &self,
        site_name: &str,
        torrent_id: &str,
    ) -> Result<Option<TorrentRecord>>;

    /// Look up a record by its info hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    async fn get_by_site_and_hash(
        &self,
        site_name: &str,
        hash: &str,
    ) -> Result<Option<TorrentRecord>>;

    /// Record that the `.torrent` file has been fetched (§4.D step 7).
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    async fn mark_downloaded(
        &self,
        site_name: &str,
        torrent_id: &str,
        torrent_hash: Option<&str>,
        is_downloaded: bool,
    ) -> Result<()>;

    /// Record the outcome of a push attempt (§4.E steps 9-10).
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    async fn mark_pushed(&self, site_name: &str, torrent_id: &str, outcome: PushOutcome) -> Result<()>;

    /// Atomically increment the retry counter and record the failure reason
    /// (§4.E step 9 on push failure).
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    async fn increment_retry(&self, site_name: &str, torrent_id: &str, last_error: &str) -> Result<()>;

    /// Sticky-mark a record as expired (§3 invariant: never reset to false).
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    async fn mark_expired(&self, site_name: &str, torrent_id: &str, last_error: &str) -> Result<()>;
}

/// Outcome of a push attempt, written back by [`TorrentRecordStore::mark_pushed`].
#[derive(Debug, Clone)]
pub struct PushOutcome {
    /// Whether the push succeeded.
    pub is_pushed: bool,
    /// Downloader the torrent was pushed to, when successful.
    pub downloader_id: Option<i64>,
    /// Downloader display name, captured at push time.
    pub downloader_name: Option<String>,
    /// Task identifier in the downloader.
    pub downloader_task_id: Option<String>,
    /// Whether the torrent should be paused when its free window closes.
    pub pause_on_free_end: bool,
    /// Error message, set when `is_pushed = false`.
    pub last_error: Option<String>,
}

/// Postgres-backed [`TorrentRecordStore`].
#[derive(Clone)]
pub struct TorrentStore {
    pool: PgPool,
}

impl TorrentStore {
    /// Connect to the store, running `pt-data`'s migrations followed by this
    /// crate's own.
    ///
    /// # Errors
    ///
    /// Returns an error if either migrator fails.
    pub async fn connect(pool: PgPool) -> Result<Self> {
        pt_data::MIGRATOR
            .run(&pool)
            .await
            .map_err(|source| StoreError::MigrationFailed { source })?;
        MIGRATOR
            .run(&pool)
            .await
            .map_err(|source| StoreError::MigrationFailed { source })?;
        Ok(Self { pool })
    }

    /// Access the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn row_to_record(row: sqlx::postgres::PgRow) -> sqlx::Result<TorrentRecord> {
    use sqlx::FromRow;
    TorrentRecord::from_row(&row)
}

#[async_trait]
impl TorrentRecordStore for TorrentStore {
    async fn upsert_torrent(&self, input: UpsertTorrentInput) -> Result<TorrentRecord> {
        let row = sqlx::query(UPSERT_TORRENT)
            .bind(input.site_name)
            .bind(input.torrent_id)
            .bind(input.title)
            .bind(input.tag)
            .bind(input.category)
            .bind(input.free_level)
            .bind(input.free_end_time)
            .bind(input.is_free)
            .bind(input.is_skipped)
            .bind(input.download_source.map(DownloadSource::as_str))
            .bind(input.filter_rule_id)
            .bind(input.size_bytes)
            .bind(input.has_hr)
            .fetch_one(&self.pool)
            .await
            .map_err(|source| StoreError::query("upsert_torrent", source))?;
        row_to_record(row).map_err(|source| StoreError::query("upsert_torrent", source))
    }

    async fn get_by_site_and_id(
        &self,
        site_name: &str,
        torrent_id: &str,
    ) -> Result<Option<TorrentRecord>> {
        let row = sqlx::query(SELECT_BY_SITE_AND_ID)
            .bind(site_name)
            .bind(torrent_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|source| StoreError::query("get_by_site_and_id", source))?;
        row.map(row_to_record)
            .transpose()
            .map_err(|source| StoreError::query("get_by_site_and_id", source))
    }

    async fn get_by_site_and_hash(
        &self,
        site_name: &str,
        hash: &str,
    ) -> Result<Option<TorrentRecord>> {
        let row = sqlx::query(SELECT_BY_SITE_AND_HASH)
            .bind(site_name)
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|source| StoreError::query("get_by_site_and_hash", source))?;
        row.map(row_to_record)
            .transpose()
            .map_err(|source| StoreError::query("get_by_site_and_hash", source))
    }

    async fn mark_downloaded(
        &self,
        site_name: &str,
        torrent_id: &str,
        torrent_hash: Option<&str>,
        is_downloaded: bool,
    ) -> Result<()> {
        sqlx::query(MARK_DOWNLOADED)
            .bind(site_name)
            .bind(torrent_id)
            .bind(torrent_hash)
            .bind(is_downloaded)
            .execute(&self.pool)
            .await
            .map_err(|source| StoreError::query("mark_downloaded", source))?;
        Ok(())
    }

    async fn mark_pushed(&self, site_name: &str, torrent_id: &str, outcome: PushOutcome) -> Result<()> {
        sqlx::query(MARK_PUSHED)
            .bind(site_name)
            .bind(torrent_id)
            .bind(outcome.is_pushed)
            .bind(outcome.downloader_id)
            .bind(outcome.downloader_name)
            .bind(outcome.downloader_task_id)
            .bind(outcome.pause_on_free_end)
            .bind(outcome.last_error)
            .execute(&self.pool)
            .await
            .map_err(|source| StoreError::query("mark_pushed", source))?;
        Ok(())
    }

    async fn increment_retry(&self, site_name: &str, torrent_id: &str, last_error: &str) -> Result<()> {
        sqlx::query(INCREMENT_RETRY)
            .bind(site_name)
            .bind(torrent_id)
            .bind(last_error)
            .execute(&self.pool)
            .await
            .map_err(|source| StoreError::query("increment_retry", source))?;
        Ok(())
    }

    async fn mark_expired(&self, site_name: &str, torrent_id: &str, last_error: &str) -> Result<()> {
        sqlx::query(MARK_EXPIRED)
            .bind(site_name)
            .bind(torrent_id)
            .bind(last_error)
            .execute(&self.pool)
            .await
            .map_err(|source| StoreError::query("mark_expired", source))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_source_round_trips() {
        for source in [DownloadSource::FreeDownload, DownloadSource::FilterRule] {
            let s = source.as_str();
            assert_eq!(DownloadSource::parse(s), Some(source));
        }
        assert_eq!(DownloadSource::parse("bogus"), None);
    }
}
