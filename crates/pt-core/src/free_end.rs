//! Free-End Monitor (spec.md §4.G): a single timer fiber that wakes at the
//! nearest pending free-promotion end time across all downloaders and
//! pauses the corresponding task.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{info, warn};

use pt_downloader::{DownloaderEngine, Registry};
use pt_telemetry::Metrics;

/// A torrent pending pause once its free promotion window ends.
#[derive(Debug, Clone)]
struct PendingEntry {
    downloader_name: String,
    task_id: String,
    free_end_time: DateTime<Utc>,
}

/// Tracks pending free-end pauses and wakes a single timer at the nearest
/// deadline rather than polling.
pub struct FreeEndMonitor {
    pending: Mutex<Vec<PendingEntry>>,
    notify: Notify,
    registry: Arc<Registry>,
    metrics: Arc<Metrics>,
}

impl FreeEndMonitor {
    /// Build a monitor bound to a downloader registry and metrics sink.
    #[must_use]
    pub fn new(registry: Arc<Registry>, metrics: Arc<Metrics>) -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            notify: Notify::new(),
            registry,
            metrics,
        }
    }

    /// Register a torrent to be paused once its free window ends.
    pub async fn register(&self, downloader_name: String, task_id: String, free_end_time: DateTime<Utc>) {
        let mut pending = self.pending.lock().await;
        pending.push(PendingEntry { downloader_name, task_id, free_end_time });
        self.metrics.set_free_end_monitor_pending(pending.len() as i64);
        drop(pending);
        self.notify.notify_one();
    }

    /// Run the monitor loop until cancelled. Intended to be spawned as a
    /// background task and aborted on shutdown.
    pub async fn run(self: Arc<Self>) {
        loop {
            let next_deadline = self.next_deadline().await;

            match next_deadline {
                Some(deadline) => {
                    let sleep_duration = deadline.saturating_duration_since(Instant::now());
                    tokio::select! {
                        () = tokio::time::sleep(sleep_duration) => {}
                        () = self.notify.notified() => continue,
                    }
                }
                None => {
                    self.notify.notified().await;
                    continue;
                }
            }

            self.fire_expired().await;
        }
    }

    async fn next_deadline(&self) -> Option<Instant> {
        let pending = self.pending.lock().await;
        let nearest = pending.iter().map(|entry| entry.free_end_time).min()?;
        let remaining = nearest - Utc::now();
        let std_duration = remaining.to_std().unwrap_or(std::time::Duration::ZERO);
        Some(Instant::now() + std_duration)
    }

    async fn fire_expired(&self) {
        let now = Utc::now();
        let mut pending = self.pending.lock().await;
        let (expired, remaining): (Vec<_>, Vec<_>) = pending.drain(..).partition(|entry| entry.free_end_time <= now);
        *pending = remaining;
        self.metrics.set_free_end_monitor_pending(pending.len() as i64);
        drop(pending);

        for entry in expired {
            let Some(handle) = self.registry.get(&entry.downloader_name).await else {
                warn!(downloader_name = %entry.downloader_name, "no handle for free-end pause, dropping entry");
                continue;
            };
            let result = handle.pause(&entry.task_id).await;
            match result {
                Ok(()) => info!(downloader_name = %entry.downloader_name, task_id = %entry.task_id, "paused torrent at free-end"),
                Err(err) => {
                    warn!(downloader_name = %entry.downloader_name, task_id = %entry.task_id, error = %err, "pause failed, retrying on next wake");
                    let mut pending = self.pending.lock().await;
                    pending.push(entry);
                    self.metrics.set_free_end_monitor_pending(pending.len() as i64);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_updates_pending_gauge() {
        let registry = Arc::new(Registry::new());
        let metrics = Arc::new(Metrics::new().expect("metrics"));
        let monitor = FreeEndMonitor::new(registry, metrics);
        monitor.register("downloader-a".to_string(), "task-1".to_string(), Utc::now()).await;
        assert_eq!(monitor.pending.lock().await.len(), 1);
    }
}
