//! Push Worker (spec.md §4.E): walks downloaded `.torrent` files, matches
//! each against its torrent record by info hash, applies the expiry /
//! retention / retry / duplicate / disk-backpressure gates, and pushes the
//! survivors to the configured downloader.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use pt_downloader::{info_hash, AddOptions, DownloaderEngine, DownloaderError, Registry, FREE_SPACE_UNKNOWN_SENTINEL_BYTES};
use pt_events::{Event, EventBus};
use pt_store::{PushOutcome as StorePushOutcome, TorrentRecordStore};
use pt_telemetry::{Metrics, PushOutcome as MetricOutcome};

use crate::error::Result;

/// A torrent past its free promotion window, ineligible for push, is
/// recorded with this exact message (domain-mandated string, matched by
/// downstream tooling).
const EXPIRED_NOT_PUSHED_MESSAGE: &str = "种子已过期，未推送";

/// Collaborators the push worker needs.
pub struct PushDeps {
    /// Torrent record store.
    pub store: Arc<dyn TorrentRecordStore>,
    /// Downloader handle registry.
    pub registry: Arc<Registry>,
    /// Event bus for `DiskSpaceLow` notifications.
    pub events: EventBus,
    /// Metrics sink.
    pub metrics: Arc<Metrics>,
    /// Maximum retry attempts before a torrent is abandoned.
    pub max_retry_count: i32,
    /// Retention window, in days, beyond which a torrent is no longer pushed.
    pub retention_days: i64,
    /// Free space floor below which pushes are aborted for the remainder
    /// of the current batch.
    pub free_space_floor_bytes: u64,
}

/// Registration handed to the free-end monitor for a successfully pushed,
/// still-free torrent.
#[derive(Debug, Clone)]
pub struct FreeEndRegistration {
    /// Downloader the torrent was pushed to.
    pub downloader_name: String,
    /// Task id assigned by the downloader.
    pub task_id: String,
    /// When the free promotion ends.
    pub free_end_time: chrono::DateTime<chrono::Utc>,
}

/// Result of a push batch: free-end registrations for successfully pushed
/// torrents still within their free window.
#[derive(Debug, Default)]
pub struct PushBatchOutcome {
    /// Torrents pushed successfully that still need free-end monitoring.
    pub free_end_registrations: Vec<FreeEndRegistration>,
    /// Whether the batch was aborted early due to low disk space.
    pub aborted_for_disk_space: bool,
}

/// Push every `.torrent` file found directly under `download_dir` to
/// `downloader_name`.
pub async fn run(deps: &PushDeps, site_name: &str, downloader_name: &str, download_dir: &Path) -> Result<PushBatchOutcome> {
    let mut outcome = PushBatchOutcome::default();

    let Some(handle) = deps.registry.get(downloader_name).await else {
        warn!(downloader_name, "no handle registered for downloader");
        return Ok(outcome);
    };

    let mut entries = match tokio::fs::read_dir(download_dir).await {
        Ok(entries) => entries,
        Err(err) => {
            warn!(path = %download_dir.display(), error = %err, "failed to list download directory");
            return Ok(outcome);
        }
    };

    let mut files = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "torrent") {
            files.push(path);
        }
    }

    for file_path in files {
        // Step: disk-backpressure gate, checked before each push attempt.
        let free_space = handle.get_free_space("").await.unwrap_or(FREE_SPACE_UNKNOWN_SENTINEL_BYTES);
        if free_space != FREE_SPACE_UNKNOWN_SENTINEL_BYTES && free_space < deps.free_space_floor_bytes {
            deps.metrics.inc_disk_space_low(downloader_name);
            deps.events.publish(Event::DiskSpaceLow {
                downloader_name: downloader_name.to_string(),
                free_bytes: free_space,
                threshold_bytes: deps.free_space_floor_bytes,
            });
            deps.metrics.inc_push_outcome(MetricOutcome::DiskBackpressure);
            outcome.aborted_for_disk_space = true;
            break;
        }

        if let Some(registration) = push_one(deps, site_name, downloader_name, handle.as_ref(), &file_path).await {
            outcome.free_end_registrations.push(registration);
        }
    }

    Ok(outcome)
}

async fn push_one(
    deps: &PushDeps,
    site_name: &str,
    downloader_name: &str,
    handle: &pt_downloader::DownloaderHandle,
    file_path: &PathBuf,
) -> Option<FreeEndRegistration> {
    let bytes = match tokio::fs::read(file_path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(path = %file_path.display(), error = %err, "failed to read torrent file");
            return None;
        }
    };

    let hash = match info_hash::compute_info_hash(&bytes) {
        Ok(hash) => hash,
        Err(err) => {
            warn!(path = %file_path.display(), error = %err, "failed to compute info hash");
            return None;
        }
    };

    // Step 1/2: hash-based lookup and orphan handling.
    let record = match deps.store.get_by_site_and_hash(site_name, &hash).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            info!(path = %file_path.display(), hash, "orphaned torrent file, no matching record");
            let _ = tokio::fs::remove_file(file_path).await;
            deps.metrics.inc_push_outcome(MetricOutcome::Orphan);
            return None;
        }
        Err(err) => {
            warn!(hash, error = %err, "failed to look up torrent record");
            return None;
        }
    };

    let torrent_id = record.torrent_id.clone();

    // Step 3: expiry gate.
    let exempted_by_filter = matches!(record.download_source(), Some(pt_store::DownloadSource::FilterRule))
        && record.filter_rule_id.is_some();
    if record.effective_expired() && !exempted_by_filter {
        let _ = deps.store.increment_retry(site_name, &torrent_id, EXPIRED_NOT_PUSHED_MESSAGE).await;
        deps.metrics.inc_push_outcome(MetricOutcome::Expired);
        return None;
    }

    // Step 4: retention gate.
    let age_days = (chrono::Utc::now() - record.last_check_time).num_days();
    if age_days > deps.retention_days {
        let _ = deps.store.increment_retry(site_name, &torrent_id, "retention window exceeded").await;
        deps.metrics.inc_push_outcome(MetricOutcome::RetentionExpired);
        return None;
    }

    // Step 5: already-pushed gate.
    if record.is_pushed == Some(true) {
        deps.metrics.inc_push_outcome(MetricOutcome::AlreadyInDownloader);
        return None;
    }

    // Step 6: retry-cap gate.
    if record.retry_count >= deps.max_retry_count {
        deps.metrics.inc_push_outcome(MetricOutcome::RetryExhausted);
        return None;
    }

    // Step 7: duplicate-in-downloader gate.
    match handle.check_torrent_exists(&hash).await {
        Ok(true) => {
            deps.metrics.inc_push_outcome(MetricOutcome::AlreadyInDownloader);
            return None;
        }
        Ok(false) => {}
        Err(err) => {
            warn!(hash, error = %err, "failed to check torrent existence");
        }
    }

    // Step 8: push attempt.
    let options = AddOptions {
        save_path: None,
        category: record.category.clone(),
        tags: vec![record.tag.clone()],
        add_at_paused: false,
    };
    let add_result = handle.add_torrent_file(bytes, options).await;

    match add_result {
        Ok(result) if result.success => {
            // Step 9: success.
            let push_outcome = StorePushOutcome {
                is_pushed: true,
                downloader_id: None,
                downloader_name: Some(downloader_name.to_string()),
                downloader_task_id: result.id.clone(),
                pause_on_free_end: record.is_free,
                last_error: None,
            };
            if let Err(err) = deps.store.mark_pushed(site_name, &torrent_id, push_outcome).await {
                warn!(hash, error = %err, "failed to record push outcome");
            }
            let _ = tokio::fs::remove_file(file_path).await;
            deps.metrics.inc_push_outcome(MetricOutcome::Pushed);

            if record.is_free {
                record.free_end_time.zip(result.id).map(|(free_end_time, task_id)| FreeEndRegistration {
                    downloader_name: downloader_name.to_string(),
                    task_id,
                    free_end_time,
                })
            } else {
                None
            }
        }
        Ok(result) => {
            let message = result.message.unwrap_or_else(|| "push rejected by downloader".to_string());
            let _ = deps.store.increment_retry(site_name, &torrent_id, &message).await;
            deps.metrics.inc_push_outcome(MetricOutcome::Failed);
            None
        }
        Err(err) => {
            let message = describe_downloader_error(&err);
            let _ = deps.store.increment_retry(site_name, &torrent_id, &message).await;
            deps.metrics.inc_push_outcome(MetricOutcome::Failed);
            None
        }
    }
}

fn describe_downloader_error(err: &DownloaderError) -> String {
    err.to_string()
}
