//! Typed configuration models assembled from the `pt-data` tables.

use pt_data::{DownloaderSettingRow, RssSubscriptionRow, SettingsGlobalRow, SiteRow};
use pt_filter::FilterRule;

/// Lower bound enforced on effective RSS poll intervals.
pub const MIN_INTERVAL_MINUTES: i32 = 1;
/// Upper bound enforced on effective RSS poll intervals.
pub const MAX_INTERVAL_MINUTES: i32 = 1440;
/// Upper bound enforced on effective per-RSS worker concurrency.
pub const MAX_CONCURRENCY: i32 = 16;

/// A site, consulted read-only by the core.
#[derive(Debug, Clone)]
pub struct Site {
    /// Row as stored.
    pub row: SiteRow,
}

/// An RSS subscription with its effective scheduling parameters resolved
/// against the global defaults.
#[derive(Debug, Clone)]
pub struct RssSubscription {
    /// Row as stored.
    pub row: RssSubscriptionRow,
}

impl RssSubscription {
    /// `getEffectiveIntervalMinutes` per spec §4.F: `<=0` falls back to the
    /// global default, then both paths are clamped to
    /// `[MIN_INTERVAL_MINUTES, MAX_INTERVAL_MINUTES]`.
    #[must_use]
    pub fn effective_interval_minutes(&self, global: &GlobalSettings) -> i32 {
        let raw = if self.row.interval_minutes <= 0 {
            global.row.default_interval_minutes
        } else {
            self.row.interval_minutes
        };
        raw.clamp(MIN_INTERVAL_MINUTES, MAX_INTERVAL_MINUTES)
    }

    /// `GetEffectiveConcurrency` per spec §4.D: `<=0` falls back to the
    /// global default, then clamped to `[1, MAX_CONCURRENCY]`.
    #[must_use]
    pub fn effective_concurrency(&self, global: &GlobalSettings) -> i32 {
        let raw = if self.row.concurrency <= 0 {
            global.row.default_concurrency
        } else {
            self.row.concurrency
        };
        raw.clamp(1, MAX_CONCURRENCY)
    }

    /// Download directory this subscription's items are saved under:
    /// the per-subscription override if set, else the global `downloadDir`.
    #[must_use]
    pub fn effective_download_path(&self, global: &GlobalSettings) -> String {
        self.row
            .download_path
            .clone()
            .unwrap_or_else(|| global.row.download_dir.clone())
    }
}

/// Trimmed per-RSS subpath derived from the subscription's tag
/// (`subPathFromTag` in spec §7).
#[must_use]
pub fn sub_path_from_tag(tag: &str) -> String {
    tag.trim().to_string()
}

/// A filter rule plus the RSS subscriptions it is associated with.
#[derive(Debug, Clone)]
pub struct FilterRuleWithAssociations {
    /// The domain rule.
    pub rule: FilterRule,
    /// RSS subscription ids this rule is explicitly associated with.
    pub rss_associations: Vec<i64>,
}

/// A downloader backend configuration.
#[derive(Debug, Clone)]
pub struct DownloaderSetting {
    /// Row as stored.
    pub row: DownloaderSettingRow,
}

/// Global settings singleton, including the cleanup block.
#[derive(Debug, Clone)]
pub struct GlobalSettings {
    /// Row as stored.
    pub row: SettingsGlobalRow,
}

/// A full, consistent view of configuration at one point in time.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    /// All sites, enabled or not.
    pub sites: Vec<Site>,
    /// All RSS subscriptions.
    pub subscriptions: Vec<RssSubscription>,
    /// All filter rules with their RSS associations.
    pub filter_rules: Vec<FilterRuleWithAssociations>,
    /// All downloader backends.
    pub downloaders: Vec<DownloaderSetting>,
    /// The global settings singleton.
    pub global: GlobalSettings,
}

impl ConfigSnapshot {
    /// The default downloader, if one is marked `is_default`.
    #[must_use]
    pub fn default_downloader(&self) -> Option<&DownloaderSetting> {
        self.downloaders.iter().find(|d| d.row.is_default)
    }

    /// A cheap fingerprint used by [`crate::ConfigWatcher`] to detect
    /// changes between polls without diffing every field.
    #[must_use]
    pub fn fingerprint(&self) -> SnapshotFingerprint {
        SnapshotFingerprint {
            site_count: self.sites.len(),
            subscription_count: self.subscriptions.len(),
            rule_count: self.filter_rules.len(),
            downloader_count: self.downloaders.len(),
            rule_ids_sum: self.filter_rules.iter().map(|r| r.rule.id).sum(),
            subscription_ids_sum: self.subscriptions.iter().map(|s| s.row.id).sum(),
        }
    }
}

/// Coarse fingerprint of a [`ConfigSnapshot`]; a change in any component
/// indicates the underlying tables changed since the last snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotFingerprint {
    site_count: usize,
    subscription_count: usize,
    rule_count: usize,
    downloader_count: usize,
    rule_ids_sum: i64,
    subscription_ids_sum: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global(default_interval: i32, default_concurrency: i32) -> GlobalSettings {
        GlobalSettings {
            row: SettingsGlobalRow {
                id: 1,
                default_interval_minutes: default_interval,
                default_concurrency,
                download_dir: "/downloads".to_string(),
                download_limit_enabled: false,
                download_speed_limit: 0,
                torrent_size_gb: 0.0,
                min_free_minutes: 0,
                retain_hours: 0,
                max_retry: 3,
                cleanup_enabled: false,
                cleanup_interval_min: 60,
                cleanup_scope: "database".to_string(),
                cleanup_scope_tags: vec![],
                condition_mode: "or".to_string(),
                max_seed_time_h: 0.0,
                min_ratio: 0.0,
                max_inactive_h: 0.0,
                slow_seed_time_h: 0.0,
                slow_max_ratio: 0.0,
                del_free_expired: false,
                disk_protect: false,
                min_disk_space_gb: 0.0,
                protect_dl: true,
                protect_hr: true,
                min_retain_h: 0.0,
                protect_tags: vec![],
                remove_data: false,
            },
        }
    }

    fn subscription(interval_minutes: i32, concurrency: i32) -> RssSubscription {
        RssSubscription {
            row: RssSubscriptionRow {
                id: 1,
                site_id: 1,
                name: "sub".to_string(),
                url: "https://example.invalid/rss".to_string(),
                category: String::new(),
                tag: " Movies ".to_string(),
                interval_minutes,
                concurrency,
                download_path: None,
                downloader_id: None,
                pause_on_free_end: false,
                is_example: false,
            },
        }
    }

    #[test]
    fn non_positive_interval_falls_back_to_global() {
        let g = global(30, 4);
        let sub = subscription(0, 0);
        assert_eq!(sub.effective_interval_minutes(&g), 30);
        assert_eq!(sub.effective_concurrency(&g), 4);
    }

    #[test]
    fn interval_is_clamped_to_bounds() {
        let g = global(30, 4);
        assert_eq!(subscription(-5, 1).effective_interval_minutes(&g), 30);
        assert_eq!(subscription(999_999, 1).effective_interval_minutes(&g), MAX_INTERVAL_MINUTES);
        assert_eq!(subscription(1, 1).effective_interval_minutes(&g), MIN_INTERVAL_MINUTES);
    }

    #[test]
    fn concurrency_is_clamped_to_max() {
        let g = global(30, 4);
        assert_eq!(subscription(1, 9999).effective_concurrency(&g), MAX_CONCURRENCY);
    }

    #[test]
    fn download_path_falls_back_to_global_dir() {
        let g = global(30, 4);
        let sub = subscription(1, 1);
        assert_eq!(sub.effective_download_path(&g), "/downloads");
    }

    #[test]
    fn sub_path_trims_tag() {
        assert_eq!(sub_path_from_tag("  Movies  "), "Movies");
    }

    #[test]
    fn fingerprint_ignores_timestamp_noise() {
        let snapshot_a = ConfigSnapshot {
            sites: vec![],
            subscriptions: vec![subscription(1, 1)],
            filter_rules: vec![],
            downloaders: vec![],
            global: global(30, 4),
        };
        let mut snapshot_b = snapshot_a.clone();
        snapshot_b.global.row.cleanup_interval_min = 120;
        assert_eq!(snapshot_a.fingerprint(), snapshot_b.fingerprint());
    }
}
