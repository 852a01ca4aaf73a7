//! Dependency construction and top-level run modes.
//!
//! # Design
//! - All collaborators are constructed once in [`Dependencies::from_env`]
//!   and threaded through explicitly, rather than reached for through
//!   globals.
//! - `run_once` executes every enabled RSS subscription a single time and
//!   returns; `run_forever` keeps tickers running and reacts to
//!   configuration changes until cancelled.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use pt_config::{ConfigService, ConfigSnapshot, ConfigWatcher};
use pt_downloader::Registry;
use pt_events::EventBus;
use pt_store::{TorrentRecordStore, TorrentStore};
use pt_telemetry::Metrics;

use crate::decision::DecisionDeps;
use crate::error::{CoreError, Result};
use crate::free_end::FreeEndMonitor;
use crate::push::PushDeps;
use crate::rss::Scheduler;
use crate::site::SiteRegistry;

const CONFIG_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default retention window, in days, when the global settings do not
/// override it.
const DEFAULT_RETENTION_DAYS: i64 = 30;

/// Default maximum retry count before a torrent is abandoned by the push
/// worker.
const DEFAULT_MAX_RETRY_COUNT: i32 = 5;

/// Collaborators required to run the decision pipeline, push worker,
/// scheduler, and free-end monitor.
pub struct Dependencies {
    config: ConfigService,
    snapshot: ConfigSnapshot,
    watcher: ConfigWatcher,
    events: EventBus,
    metrics: Arc<Metrics>,
    store: Arc<dyn TorrentRecordStore>,
    registry: Arc<Registry>,
    sites: Arc<SiteRegistry>,
    download_root: PathBuf,
}

impl Dependencies {
    /// Construct production dependencies from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing, the
    /// database cannot be reached, migrations fail, or telemetry cannot be
    /// initialised.
    pub async fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| CoreError::MissingEnv { name: "DATABASE_URL" })?;
        let download_root = std::env::var("PT_DOWNLOAD_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./downloads"));

        let pool = PgPoolOptions::new().max_connections(10).connect(&database_url).await?;

        let config = ConfigService::new(pool.clone());
        let events = EventBus::new();
        let (snapshot, watcher) = config.watch(CONFIG_POLL_INTERVAL, events.clone()).await?;

        let metrics = Arc::new(Metrics::new().map_err(CoreError::Telemetry)?);
        let store: Arc<dyn TorrentRecordStore> = Arc::new(TorrentStore::connect(pool).await?);
        let registry = Arc::new(Registry::new());
        let sites = Arc::new(SiteRegistry::new());

        register_configured_downloaders(&registry, &snapshot).await;

        info!("core dependencies constructed");

        Ok(Self {
            config,
            snapshot,
            watcher,
            events,
            metrics,
            store,
            registry,
            sites,
            download_root,
        })
    }

    /// Build and register a downloader handle from `params`, making it
    /// available to the push worker and cleanup engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be constructed.
    pub async fn register_downloader(&self, params: &pt_downloader::DownloaderFactoryParams) -> Result<Arc<pt_downloader::DownloaderHandle>> {
        self.registry.register(params).await.map_err(CoreError::from)
    }

    /// Register a site collaborator for `site_name`, making it available
    /// to the decision pipeline.
    pub async fn register_site(&self, site_name: impl Into<String>, client: Arc<dyn crate::site::SiteClient>) {
        self.sites.register(site_name, client).await;
    }

    /// Access the underlying config service, e.g. for CLI subcommands that
    /// need a fresh snapshot.
    #[must_use]
    pub const fn config(&self) -> &ConfigService {
        &self.config
    }

    /// Access the event bus, for collaborators that want to publish or
    /// subscribe outside the scheduler.
    #[must_use]
    pub fn events(&self) -> EventBus {
        self.events.clone()
    }

    fn decision_deps(&self) -> Arc<DecisionDeps> {
        Arc::new(DecisionDeps {
            store: Arc::clone(&self.store),
            filters: Arc::new(pt_filter::FilterMatcherCache::new()),
            sites: Arc::clone(&self.sites),
            metrics: Arc::clone(&self.metrics),
            download_root: self.download_root.clone(),
        })
    }

    fn push_deps(&self) -> Arc<PushDeps> {
        Arc::new(PushDeps {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            events: self.events.clone(),
            metrics: Arc::clone(&self.metrics),
            max_retry_count: DEFAULT_MAX_RETRY_COUNT,
            retention_days: DEFAULT_RETENTION_DAYS,
            free_space_floor_bytes: 0,
        })
    }
}

/// Run every enabled RSS subscription exactly once, then return.
/// Per-subscription tick failures are logged and do not abort the batch.
///
/// # Errors
///
/// Currently infallible; kept as a `Result` for symmetry with
/// [`run_forever`] and to absorb future construction failures.
pub async fn run_once(deps: &Dependencies) -> Result<()> {
    let decision_deps = deps.decision_deps();
    decision_deps.filters.refresh_cache(rules(&deps.snapshot), &associations(&deps.snapshot));

    let push_deps = deps.push_deps();
    let scheduler = Scheduler::new(decision_deps, push_deps, deps.events.clone(), Arc::clone(&deps.metrics), deps.snapshot.clone());
    scheduler.run_once().await;
    Ok(())
}

/// Run in persistent mode until `shutdown` resolves: tickers keep running
/// on their configured interval and react to hot configuration reloads.
/// Background task join failures on shutdown are logged, not propagated.
///
/// # Errors
///
/// Currently infallible; kept as a `Result` so the signature can absorb
/// a fallible shutdown path without breaking callers.
pub async fn run_forever(deps: Dependencies, shutdown: impl std::future::Future<Output = ()>) -> Result<()> {
    let Dependencies { config: _, snapshot, watcher, events, metrics, store, registry, sites, download_root } = deps;

    let decision_deps = Arc::new(DecisionDeps {
        store: Arc::clone(&store),
        filters: Arc::new(pt_filter::FilterMatcherCache::new()),
        sites,
        metrics: Arc::clone(&metrics),
        download_root,
    });
    decision_deps.filters.refresh_cache(rules(&snapshot), &associations(&snapshot));

    let push_deps = Arc::new(PushDeps {
        store,
        registry: Arc::clone(&registry),
        events: events.clone(),
        metrics: Arc::clone(&metrics),
        max_retry_count: DEFAULT_MAX_RETRY_COUNT,
        retention_days: DEFAULT_RETENTION_DAYS,
        free_space_floor_bytes: 0,
    });

    let scheduler = Arc::new(Scheduler::new(decision_deps, push_deps, events, Arc::clone(&metrics), snapshot));
    let free_end = Arc::new(FreeEndMonitor::new(registry, metrics));

    let scheduler_for_run = Arc::clone(&scheduler);
    let scheduler_task = tokio::spawn(async move { scheduler_for_run.run_forever(watcher).await });

    let free_end_for_run = Arc::clone(&free_end);
    let free_end_task = tokio::spawn(async move { free_end_for_run.run().await });

    shutdown.await;
    info!("shutdown signal received, stopping core tasks");

    scheduler.shutdown().await;
    scheduler_task.abort();
    if let Err(err) = scheduler_task.await {
        if !err.is_cancelled() {
            warn!(error = %err, "scheduler task join failed");
        }
    }

    free_end_task.abort();
    if let Err(err) = free_end_task.await {
        if !err.is_cancelled() {
            warn!(error = %err, "free-end monitor task join failed");
        }
    }

    Ok(())
}

/// Build and register a handle for every enabled downloader in `snapshot`.
/// A downloader whose `kind` string is unrecognized is logged and skipped
/// rather than failing the whole bootstrap.
async fn register_configured_downloaders(registry: &Registry, snapshot: &ConfigSnapshot) {
    for downloader in &snapshot.downloaders {
        if !downloader.row.enabled {
            continue;
        }
        let Some(kind) = parse_downloader_kind(&downloader.row.kind) else {
            warn!(name = %downloader.row.name, kind = %downloader.row.kind, "unrecognized downloader kind, skipping registration");
            continue;
        };
        let params = pt_downloader::DownloaderFactoryParams {
            name: downloader.row.name.clone(),
            kind,
            base_url: downloader.row.url.clone(),
            username: downloader.row.username.clone(),
            password: downloader.row.password.clone(),
        };
        match registry.register(&params).await {
            Ok(_) => info!(name = %downloader.row.name, "registered downloader"),
            Err(err) => warn!(name = %downloader.row.name, error = %err, "failed to register downloader"),
        }
    }
}

fn parse_downloader_kind(kind: &str) -> Option<pt_downloader::DownloaderKind> {
    match kind.to_ascii_lowercase().as_str() {
        "qbittorrent" => Some(pt_downloader::DownloaderKind::QBittorrent),
        "transmission" => Some(pt_downloader::DownloaderKind::Transmission),
        _ => None,
    }
}

fn rules(snapshot: &ConfigSnapshot) -> Vec<pt_filter::FilterRule> {
    snapshot.filter_rules.iter().map(|rule| rule.rule.clone()).collect()
}

fn associations(snapshot: &ConfigSnapshot) -> Vec<(i64, i64)> {
    snapshot
        .filter_rules
        .iter()
        .flat_map(|rule| rule.rss_associations.iter().map(|rss_id| (rule.rule.id, *rss_id)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retry_and_retention_are_positive() {
        assert!(DEFAULT_MAX_RETRY_COUNT > 0);
        assert!(DEFAULT_RETENTION_DAYS > 0);
    }
}
