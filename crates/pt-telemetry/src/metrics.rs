//! Prometheus-backed metrics registry for decision-pipeline, push, and
//! cleanup outcomes (§4.D/E/H).
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Counters are scoped per RSS subscription via label values, not per-type
//!   structs, so a new subscription never needs a new collector.

use std::convert::TryFrom;
use std::time::Duration;

use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Prometheus-backed metrics registry shared across `pt-core` tasks.
#[derive(Clone)]
pub struct Metrics {
    inner: std::sync::Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    decision_items_total: IntCounterVec,
    push_outcomes_total: IntCounterVec,
    cleanup_outcomes_total: IntCounterVec,
    rss_tick_duration_ms: IntGauge,
    active_rss_tickers: IntGauge,
    free_end_monitor_pending: IntGauge,
    disk_space_low_events_total: IntCounterVec,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let decision_items_total = IntCounterVec::new(
            Opts::new(
                "decision_items_total",
                "RSS items processed by the decision pipeline, by RSS subscription and outcome",
            ),
            &["rss", "outcome"],
        )?;
        let push_outcomes_total = IntCounterVec::new(
            Opts::new(
                "push_outcomes_total",
                "Torrents handled by the push worker, by downloader and outcome",
            ),
            &["downloader", "outcome"],
        )?;
        let cleanup_outcomes_total = IntCounterVec::new(
            Opts::new(
                "cleanup_outcomes_total",
                "Torrents evaluated by the cleanup engine, by downloader and outcome",
            ),
            &["downloader", "outcome"],
        )?;
        let rss_tick_duration_ms =
            IntGauge::with_opts(Opts::new("rss_tick_duration_ms", "Duration of the last decision-pipeline tick, in milliseconds"))?;
        let active_rss_tickers =
            IntGauge::with_opts(Opts::new("active_rss_tickers", "Number of RSS schedulers currently running"))?;
        let free_end_monitor_pending = IntGauge::with_opts(Opts::new(
            "free_end_monitor_pending",
            "Torrents currently tracked by the free-end monitor awaiting their free window to close",
        ))?;
        let disk_space_low_events_total = IntCounterVec::new(
            Opts::new(
                "disk_space_low_events_total",
                "DiskSpaceLow events emitted, by downloader",
            ),
            &["downloader"],
        )?;

        registry.register(Box::new(decision_items_total.clone()))?;
        registry.register(Box::new(push_outcomes_total.clone()))?;
        registry.register(Box::new(cleanup_outcomes_total.clone()))?;
        registry.register(Box::new(rss_tick_duration_ms.clone()))?;
        registry.register(Box::new(active_rss_tickers.clone()))?;
        registry.register(Box::new(free_end_monitor_pending.clone()))?;
        registry.register(Box::new(disk_space_low_events_total.clone()))?;

        Ok(Self {
            inner: std::sync::Arc::new(MetricsInner {
                registry,
                decision_items_total,
                push_outcomes_total,
                cleanup_outcomes_total,
                rss_tick_duration_ms,
                active_rss_tickers,
                free_end_monitor_pending,
                disk_space_low_events_total,
            }),
        })
    }

    /// Increment a decision-pipeline outcome counter (§4.D: `total`, `free`,
    /// `downloaded`, `skipped`, `detail_failed`, `download_failed`).
    pub fn inc_decision_item(&self, rss: &str, outcome: DecisionOutcome) {
        self.inner
            .decision_items_total
            .with_label_values(&[rss, outcome.as_str()])
            .inc();
    }

    /// Increment a push-worker outcome counter (§4.E).
    pub fn inc_push_outcome(&self, downloader: &str, outcome: PushOutcome) {
        self.inner
            .push_outcomes_total
            .with_label_values(&[downloader, outcome.as_str()])
            .inc();
    }

    /// Increment a cleanup-engine outcome counter (§4.H).
    pub fn inc_cleanup_outcome(&self, downloader: &str, outcome: CleanupOutcome) {
        self.inner
            .cleanup_outcomes_total
            .with_label_values(&[downloader, outcome.as_str()])
            .inc();
    }

    /// Record the wall-clock duration of the most recent decision-pipeline tick.
    pub fn observe_rss_tick_duration(&self, duration: Duration) {
        self.inner
            .rss_tick_duration_ms
            .set(Self::duration_to_ms(duration));
    }

    /// Set the number of RSS schedulers currently running.
    pub fn set_active_rss_tickers(&self, count: i64) {
        self.inner.active_rss_tickers.set(count);
    }

    /// Set the number of entries currently tracked by the free-end monitor.
    pub fn set_free_end_monitor_pending(&self, count: i64) {
        self.inner.free_end_monitor_pending.set(count);
    }

    /// Increment the `DiskSpaceLow` event counter for `downloader`.
    pub fn inc_disk_space_low(&self, downloader: &str) {
        self.inner
            .disk_space_low_events_total
            .with_label_values(&[downloader])
            .inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("failed to encode Prometheus metrics")?;
        String::from_utf8(buffer).context("metrics output was not valid UTF-8")
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

/// Per-item outcome recorded by the decision pipeline (§4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOutcome {
    /// Item observed, regardless of what happened to it.
    Total,
    /// Item's detail reported `isFree`.
    Free,
    /// Item's `.torrent` file was downloaded.
    Downloaded,
    /// Item was skipped (neither the free path nor the filter path matched).
    Skipped,
    /// Detail fetch failed.
    DetailFailed,
    /// `.torrent` download failed.
    DownloadFailed,
}

impl DecisionOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Total => "total",
            Self::Free => "free",
            Self::Downloaded => "downloaded",
            Self::Skipped => "skipped",
            Self::DetailFailed => "detail_failed",
            Self::DownloadFailed => "download_failed",
        }
    }
}

/// Per-file outcome recorded by the push worker (§4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Torrent file was pushed to the downloader successfully.
    Pushed,
    /// Push failed and the retry counter was incremented.
    Failed,
    /// File had no matching record and was deleted as an orphan.
    Orphan,
    /// Record was expired and not exempt; file deleted.
    Expired,
    /// Record exceeded `retainHours` without being pushed; file deleted.
    RetentionExpired,
    /// Downloader already held the torrent; marked pushed without a push.
    AlreadyInDownloader,
    /// Retry cap reached; file deleted.
    RetryExhausted,
    /// Batch aborted early due to disk backpressure.
    DiskBackpressure,
}

impl PushOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Pushed => "pushed",
            Self::Failed => "failed",
            Self::Orphan => "orphan",
            Self::Expired => "expired",
            Self::RetentionExpired => "retention_expired",
            Self::AlreadyInDownloader => "already_in_downloader",
            Self::RetryExhausted => "retry_exhausted",
            Self::DiskBackpressure => "disk_backpressure",
        }
    }
}

/// Per-candidate outcome recorded by the cleanup engine (§4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// Candidate removed from the downloader.
    Removed,
    /// Candidate spared by a protection rule.
    Protected,
    /// Candidate removed as part of a forced disk-backpressure eviction.
    ForcedEviction,
    /// Removal request to the downloader failed.
    Failed,
}

impl CleanupOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Removed => "removed",
            Self::Protected => "protected",
            Self::ForcedEviction => "forced_eviction",
            Self::Failed => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_to_ms_saturates_on_large_values() {
        let duration = Duration::from_secs(u64::MAX / 2);
        assert_eq!(Metrics::duration_to_ms(duration), i64::MAX);
    }

    #[test]
    fn metrics_render_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_decision_item("nexus-movies", DecisionOutcome::Total);
        metrics.inc_decision_item("nexus-movies", DecisionOutcome::Downloaded);
        metrics.inc_push_outcome("qb-main", PushOutcome::Pushed);
        metrics.inc_cleanup_outcome("qb-main", CleanupOutcome::Removed);
        metrics.observe_rss_tick_duration(Duration::from_millis(250));
        metrics.set_active_rss_tickers(3);
        metrics.set_free_end_monitor_pending(1);
        metrics.inc_disk_space_low("qb-main");

        let rendered = metrics.render()?;
        assert!(rendered.contains("decision_items_total"));
        assert!(rendered.contains("push_outcomes_total"));
        assert!(rendered.contains("cleanup_outcomes_total"));
        assert!(rendered.contains("disk_space_low_events_total"));
        Ok(())
    }
}
