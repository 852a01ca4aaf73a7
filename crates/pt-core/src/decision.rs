//! Decision Pipeline (spec.md §4.D): evaluates each RSS item against
//! de-dup, free/finishability, and filter rules, then downloads the
//! `.torrent` file for items that should be fetched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use pt_config::RssSubscription;
use pt_filter::{FilterMatcherCache, MatchInput};
use pt_store::{DownloadSource, TorrentRecordStore, UpsertTorrentInput};
use pt_telemetry::{DecisionOutcome, Metrics};

use crate::error::{CoreError, Result};
use crate::model::{DecisionCounters, RssItem};
use crate::site::SiteRegistry;

/// Shared collaborators the decision pipeline needs for a single RSS tick.
pub struct DecisionDeps {
    /// Torrent record store.
    pub store: Arc<dyn TorrentRecordStore>,
    /// Compiled filter rule cache.
    pub filters: Arc<FilterMatcherCache>,
    /// Registry of external site collaborators, keyed by site name.
    pub sites: Arc<SiteRegistry>,
    /// Metrics sink.
    pub metrics: Arc<Metrics>,
    /// Root directory `.torrent` files are written under.
    pub download_root: PathBuf,
}

/// Run the decision pipeline for every item currently published under a
/// subscription's feed, bounded by `sub.effective_concurrency`.
pub async fn run(deps: &DecisionDeps, site_name: &str, sub: &RssSubscription, min_free_minutes: i64, concurrency: usize) -> Result<DecisionCounters> {
    let site = deps.sites.get(site_name).await.ok_or_else(|| CoreError::Site(crate::site::SiteError::UnknownSite { site_name: site_name.to_string() }))?;
    let feed = site.fetch_rss(site_name, &sub.row.tag).await?;
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for item in feed.items {
        let permit = Arc::clone(&semaphore);
        let store = Arc::clone(&deps.store);
        let filters = Arc::clone(&deps.filters);
        let site = Arc::clone(&site);
        let metrics = Arc::clone(&deps.metrics);
        let download_root = deps.download_root.clone();
        let site_name = site_name.to_string();
        let rss_id = sub.row.id;
        let rss_tag = sub.row.tag.clone();
        let require_free_override = min_free_minutes;

        tasks.spawn(async move {
            let _permit = permit.acquire_owned().await.expect("semaphore is never closed");
            process_item(&store, &filters, site.as_ref(), &metrics, &download_root, &site_name, rss_id, &rss_tag, &item, require_free_override).await
        });
    }

    let mut counters = DecisionCounters::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => counters.merge(outcome),
            Err(err) => warn!(error = %err, "decision pipeline task panicked"),
        }
    }
    Ok(counters)
}

impl DecisionCounters {
    fn merge(&mut self, other: Self) {
        self.total += other.total;
        self.free += other.free;
        self.downloaded += other.downloaded;
        self.skipped += other.skipped;
        self.detail_failed += other.detail_failed;
        self.download_failed += other.download_failed;
    }
}

#[allow(clippy::too_many_arguments)]
async fn process_item(
    store: &Arc<dyn TorrentRecordStore>,
    filters: &Arc<FilterMatcherCache>,
    site: &dyn SiteClient,
    metrics: &Metrics,
    download_root: &Path,
    site_name: &str,
    rss_id: i64,
    rss_tag: &str,
    item: &RssItem,
    min_free_minutes: i64,
) -> DecisionCounters {
    let mut counters = DecisionCounters { total: 1, ..DecisionCounters::new() };
    metrics.inc_decision_item(DecisionOutcome::Total);

    // Step 1: de-dup against any existing record.
    if let Ok(Some(existing)) = store.get_by_site_and_id(site_name, &item.torrent_id).await {
        if existing.is_skipped || existing.is_pushed.is_some() {
            counters.skipped += 1;
            metrics.inc_decision_item(DecisionOutcome::Skipped);
            return counters;
        }
    }

    // Step 2: detail fetch.
    let detail = match site.fetch_detail(site_name, &item.torrent_id).await {
        Ok(detail) => detail,
        Err(err) => {
            warn!(site = site_name, torrent_id = %item.torrent_id, error = %err, "detail fetch failed");
            counters.detail_failed += 1;
            metrics.inc_decision_item(DecisionOutcome::DetailFailed);
            return counters;
        }
    };

    // Step 3: free/finishability.
    let can_finish = detail.can_be_finished(min_free_minutes);
    let should_download_by_free = detail.is_free && can_finish;
    if detail.is_free {
        counters.free += 1;
        metrics.inc_decision_item(DecisionOutcome::Free);
    }

    // Step 4: filter evaluation.
    let match_input = MatchInput { title: item.title.clone(), tag: detail.subtitle.clone() };
    let match_outcome = filters.should_download_for_rss_with_input(&match_input, detail.is_free, rss_id);
    let should_download_by_filter = match_outcome.should_download;

    // Step 5: dual-path decision. Filter takes priority when both match.
    let should_download = should_download_by_free || should_download_by_filter;
    if !should_download {
        counters.skipped += 1;
        metrics.inc_decision_item(DecisionOutcome::Skipped);
        let reason = if !detail.is_free {
            "not currently free".to_string()
        } else if !can_finish {
            "insufficient free time remaining to finish".to_string()
        } else {
            "no filter rule matched".to_string()
        };
        let _ = upsert_skip(store, site_name, item, &detail, &reason).await;
        return counters;
    }

    // Step 6: persist pre-download upsert.
    let download_source = if should_download_by_filter { DownloadSource::FilterRule } else { DownloadSource::FreeDownload };
    let filter_rule_id = if should_download_by_filter { match_outcome.rule.as_ref().map(|rule| rule.id) } else { None };

    let upsert = UpsertTorrentInput {
        site_name: site_name.to_string(),
        torrent_id: item.torrent_id.clone(),
        title: item.title.clone(),
        tag: rss_tag.to_string(),
        category: item.category.clone(),
        free_level: detail.free_level.clone(),
        free_end_time: detail.free_end_time,
        is_free: detail.is_free,
        is_skipped: false,
        download_source: Some(download_source),
        filter_rule_id,
        size_bytes: detail.size_bytes,
        has_hr: detail.has_hr,
    };
    if let Err(err) = store.upsert_torrent(upsert).await {
        warn!(site = site_name, torrent_id = %item.torrent_id, error = %err, "failed to persist pre-download upsert");
        return counters;
    }

    // Step 7: download the `.torrent` file.
    match download_torrent_file(site, download_root, site_name, rss_tag, item).await {
        Ok(Some(hash)) => {
            let _ = store.mark_downloaded(site_name, &item.torrent_id, Some(&hash), true).await;
            counters.downloaded += 1;
            metrics.inc_decision_item(DecisionOutcome::Downloaded);
        }
        Ok(None) => {
            let _ = store.mark_downloaded(site_name, &item.torrent_id, None, false).await;
            counters.download_failed += 1;
            metrics.inc_decision_item(DecisionOutcome::DownloadFailed);
        }
        Err(err) => {
            warn!(site = site_name, torrent_id = %item.torrent_id, error = %err, "torrent download failed");
            let _ = store.mark_downloaded(site_name, &item.torrent_id, None, false).await;
            counters.download_failed += 1;
            metrics.inc_decision_item(DecisionOutcome::DownloadFailed);
        }
    }
    counters
}

async fn upsert_skip(
    store: &Arc<dyn TorrentRecordStore>,
    site_name: &str,
    item: &RssItem,
    detail: &crate::model::TorrentDetail,
    reason: &str,
) -> Result<()> {
    info!(site = site_name, torrent_id = %item.torrent_id, reason, "skipping item");
    let upsert = UpsertTorrentInput {
        site_name: site_name.to_string(),
        torrent_id: item.torrent_id.clone(),
        title: item.title.clone(),
        tag: item.tag.clone(),
        category: item.category.clone(),
        free_level: detail.free_level.clone(),
        free_end_time: detail.free_end_time,
        is_free: detail.is_free,
        is_skipped: true,
        download_source: None,
        filter_rule_id: None,
        size_bytes: detail.size_bytes,
        has_hr: detail.has_hr,
    };
    store.upsert_torrent(upsert).await.map(|_| ()).map_err(CoreError::from)
}

/// Download `.torrent` bytes, write them under `downloadRoot/subPath(tag)`,
/// and return the computed info hash. Returns `Ok(None)` if the file was
/// reported written but is missing on disk afterwards.
async fn download_torrent_file(site: &dyn SiteClient, download_root: &Path, site_name: &str, tag: &str, item: &RssItem) -> Result<Option<String>> {
    let bytes = site.download_torrent(site_name, &item.torrent_id).await?;

    let sub_dir = download_root.join(pt_config::sub_path_from_tag(tag));
    tokio::fs::create_dir_all(&sub_dir).await?;

    let filename = format!("{}-{}.torrent", site_name.to_lowercase(), item.torrent_id);
    let file_path = sub_dir.join(filename);
    tokio::fs::write(&file_path, &bytes).await?;

    if tokio::fs::metadata(&file_path).await.is_err() {
        warn!(path = %file_path.display(), "torrent file reported written but missing on disk");
        return Ok(None);
    }

    let hash = pt_downloader::info_hash::compute_info_hash(&bytes).map_err(CoreError::from)?;
    Ok(Some(hash))
}
