//! RSS Scheduler (spec.md §4.F): drives one ticker per enabled RSS
//! subscription, each running the decision pipeline followed by the push
//! worker on a fixed interval, with hot reload on `ConfigChanged`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use pt_config::{ConfigSnapshot, ConfigWatcher, RssSubscription};
use pt_events::EventBus;
use pt_telemetry::Metrics;

use crate::decision::{self, DecisionDeps};
use crate::error::CoreError;
use crate::push::{self, PushDeps};

/// Hard ceiling on a single scheduler tick (decision pipeline + push
/// worker), per spec.md §9: a fresh, bounded context per tick.
const TICK_TIMEOUT: Duration = Duration::from_secs(10 * 60);

struct Ticker {
    handle: JoinHandle<()>,
    interval_minutes: i32,
    enabled: bool,
}

/// Drives per-subscription tickers and reacts to configuration changes.
pub struct Scheduler {
    decision_deps: Arc<DecisionDeps>,
    push_deps: Arc<PushDeps>,
    events: EventBus,
    metrics: Arc<Metrics>,
    snapshot: Arc<RwLock<ConfigSnapshot>>,
    tickers: Mutex<HashMap<i64, Ticker>>,
}

impl Scheduler {
    /// Build a scheduler over shared decision/push collaborators and an
    /// initial configuration snapshot.
    #[must_use]
    pub fn new(decision_deps: Arc<DecisionDeps>, push_deps: Arc<PushDeps>, events: EventBus, metrics: Arc<Metrics>, initial: ConfigSnapshot) -> Self {
        Self {
            decision_deps,
            push_deps,
            events,
            metrics,
            snapshot: Arc::new(RwLock::new(initial)),
            tickers: Mutex::new(HashMap::new()),
        }
    }

    /// Run every enabled subscription in the current snapshot exactly once.
    pub async fn run_once(&self) {
        let snapshot = self.snapshot.read().await.clone();
        let mut active = 0i64;
        for sub in &snapshot.subscriptions {
            if !sub.row.enabled {
                continue;
            }
            active += 1;
            if let Err(err) = run_tick(&self.decision_deps, &self.push_deps, &self.snapshot, sub).await {
                warn!(rss_id = sub.row.id, error = %err, "rss single-mode tick failed");
            }
        }
        self.metrics.set_active_rss_tickers(active);
    }

    /// Run in persistent mode: apply the initial snapshot immediately,
    /// then keep reacting to `watcher`'s `ConfigChanged` notifications
    /// until the caller aborts the task this returns from `tokio::spawn`.
    pub async fn run_forever(self: Arc<Self>, mut watcher: ConfigWatcher) {
        let initial = self.snapshot.read().await.clone();
        self.reload(initial).await;

        loop {
            match watcher.next().await {
                Ok(snapshot) => self.reload(snapshot).await,
                Err(err) => warn!(error = %err, "config watcher failed, retrying on next poll"),
            }
        }
    }

    /// Abort every running ticker. Call before dropping the scheduler.
    pub async fn shutdown(&self) {
        let mut tickers = self.tickers.lock().await;
        for (rss_id, ticker) in tickers.drain() {
            ticker.handle.abort();
            info!(rss_id, "aborted rss ticker on shutdown");
        }
    }

    async fn reload(&self, new_snapshot: ConfigSnapshot) {
        *self.snapshot.write().await = new_snapshot.clone();

        let mut tickers = self.tickers.lock().await;

        let active_ids: Vec<i64> = new_snapshot.subscriptions.iter().map(|sub| sub.row.id).collect();
        let removed: Vec<i64> = tickers.keys().filter(|id| !active_ids.contains(id)).copied().collect();
        for id in removed {
            if let Some(ticker) = tickers.remove(&id) {
                ticker.handle.abort();
                info!(rss_id = id, "aborted ticker for removed subscription");
            }
        }

        for sub in &new_snapshot.subscriptions {
            let interval_minutes = sub.effective_interval_minutes(&new_snapshot.global);

            let needs_restart = match tickers.get(&sub.row.id) {
                Some(existing) => existing.interval_minutes != interval_minutes || existing.enabled != sub.row.enabled,
                None => true,
            };

            if !needs_restart {
                continue;
            }

            if let Some(existing) = tickers.remove(&sub.row.id) {
                existing.handle.abort();
            }

            if !sub.row.enabled {
                continue;
            }

            let handle = self.spawn_ticker(sub.clone(), interval_minutes);
            tickers.insert(sub.row.id, Ticker { handle, interval_minutes, enabled: sub.row.enabled });
            info!(rss_id = sub.row.id, interval_minutes, "started rss ticker");
        }

        self.metrics.set_active_rss_tickers(tickers.len() as i64);
    }

    fn spawn_ticker(&self, sub: RssSubscription, interval_minutes: i32) -> JoinHandle<()> {
        let decision_deps = Arc::clone(&self.decision_deps);
        let push_deps = Arc::clone(&self.push_deps);
        let snapshot = Arc::clone(&self.snapshot);
        let metrics = Arc::clone(&self.metrics);

        tokio::spawn(async move {
            let period = Duration::from_secs(u64::try_from(interval_minutes.max(1)).unwrap_or(1) * 60);
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let started = std::time::Instant::now();
                if let Err(err) = run_tick(&decision_deps, &push_deps, &snapshot, &sub).await {
                    warn!(rss_id = sub.row.id, error = %err, "rss tick failed");
                }
                metrics.observe_rss_tick_duration(started.elapsed());
            }
        })
    }
}

async fn run_tick(
    decision_deps: &Arc<DecisionDeps>,
    push_deps: &Arc<PushDeps>,
    snapshot: &Arc<RwLock<ConfigSnapshot>>,
    sub: &RssSubscription,
) -> crate::error::Result<()> {
    let decision_deps = Arc::clone(decision_deps);
    let push_deps = Arc::clone(push_deps);
    let sub = sub.clone();
    let snapshot = Arc::clone(snapshot);
    let download_root = decision_deps.download_root.clone();

    let result = tokio::time::timeout(TICK_TIMEOUT, async move {
        let current = snapshot.read().await.clone();
        let site_name = current
            .sites
            .iter()
            .find(|site| site.row.id == sub.row.site_id)
            .map(|site| site.row.name.clone())
            .ok_or_else(|| CoreError::MissingEnv { name: "site" })?;
        let concurrency = sub.effective_concurrency(&current.global) as usize;

        let counters = decision::run(&decision_deps, &site_name, &sub, 0, concurrency.max(1)).await?;
        info!(rss_id = sub.row.id, total = counters.total, downloaded = counters.downloaded, "decision pipeline tick complete");

        let download_dir = download_root.join(pt_config::sub_path_from_tag(&sub.row.tag));
        if let Some(downloader) = current.default_downloader() {
            push::run(&push_deps, &site_name, &downloader.row.name, &download_dir).await?;
        }
        Ok::<(), CoreError>(())
    })
    .await;

    match result {
        Ok(inner) => inner,
        Err(_) => Err(CoreError::Timeout { task: "rss_tick" }),
    }
}
