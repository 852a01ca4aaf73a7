//! Schema rows for the configuration tables (`site`, `rss_subscription`,
//! `filter_rule`, `rss_filter_association`, `downloader_setting`,
//! `settings_global`).
//!
//! Rows are thin `sqlx::FromRow` structs; conversion into the richer domain
//! types `pt-config` exposes to callers lives on each row via `TryFrom`/`From`
//! so the conversion logic has exactly one home.

use chrono::{DateTime, Utc};
use pt_filter::{FilterRule, MatchField, PatternKind};
use sqlx::FromRow;

use crate::error::{DataError, Result};

/// Row for the `site` table.
#[derive(Debug, Clone, FromRow)]
pub struct SiteRow {
    /// Surrogate identifier.
    pub id: i64,
    /// Unique site name.
    pub name: String,
    /// Whether the site is consulted by the scheduler.
    pub enabled: bool,
    /// Opaque auth payload (cookies, passkey, etc.), treated as out-of-core.
    pub auth: Option<serde_json::Value>,
    /// Token-bucket burst size for the per-site rate limiter.
    pub rate_burst: Option<i32>,
    /// Token-bucket refill rate for the per-site rate limiter.
    pub rate_limit: Option<i32>,
}

/// Row for the `rss_subscription` table.
#[derive(Debug, Clone, FromRow)]
pub struct RssSubscriptionRow {
    /// Surrogate identifier.
    pub id: i64,
    /// Owning site.
    pub site_id: i64,
    /// Display name.
    pub name: String,
    /// Feed URL.
    pub url: String,
    /// Category label applied to downloaded torrents.
    pub category: String,
    /// Tag used to derive the download subpath.
    pub tag: String,
    /// Configured poll interval; `<= 0` falls back to the global default.
    pub interval_minutes: i32,
    /// Configured worker concurrency; `<= 0` falls back to the global default.
    pub concurrency: i32,
    /// Per-subscription override of the download directory.
    pub download_path: Option<String>,
    /// Downloader this subscription pushes into, when set.
    pub downloader_id: Option<i64>,
    /// Whether pushed torrents should be paused when their free window closes.
    pub pause_on_free_end: bool,
    /// Example/placeholder subscriptions are always skipped.
    pub is_example: bool,
}

impl RssSubscriptionRow {
    /// `ShouldSkip` per spec.md §3: example subscriptions or an empty URL.
    #[must_use]
    pub fn should_skip(&self) -> bool {
        self.is_example || self.url.is_empty()
    }
}

/// Row for the `filter_rule` table.
#[derive(Debug, Clone, FromRow)]
pub struct FilterRuleRow {
    /// Surrogate identifier.
    pub id: i64,
    /// Unique rule name.
    pub name: String,
    /// Raw pattern text.
    pub pattern: String,
    /// One of `keyword` / `wildcard` / `regex`.
    pub pattern_type: String,
    /// One of `title` / `tag` / `both`.
    pub match_field: String,
    /// Gates download authorization on the torrent being free.
    pub require_free: bool,
    /// Disabled rules are excluded from the compiled cache.
    pub enabled: bool,
    /// Lower values take precedence.
    pub priority: i32,
    /// Restricts the rule to a single site.
    pub site_id: Option<i64>,
    /// Restricts the rule to a single RSS subscription.
    pub rss_id: Option<i64>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<FilterRuleRow> for FilterRule {
    type Error = DataError;

    fn try_from(row: FilterRuleRow) -> Result<Self> {
        let pattern_kind = parse_pattern_kind(&row.pattern_type)?;
        let match_field = parse_match_field(&row.match_field)?;
        Ok(Self {
            id: row.id,
            name: row.name,
            pattern: row.pattern,
            pattern_kind,
            match_field,
            require_free: row.require_free,
            enabled: row.enabled,
            priority: row.priority,
            site_id: row.site_id,
            rss_id: row.rss_id,
            created_at: row.created_at,
        })
    }
}

fn parse_pattern_kind(value: &str) -> Result<PatternKind> {
    match value {
        "keyword" => Ok(PatternKind::Keyword),
        "wildcard" => Ok(PatternKind::Wildcard),
        "regex" => Ok(PatternKind::Regex),
        other => Err(DataError::RowDecode {
            field: "pattern_type",
            reason: format!("unknown pattern type '{other}'"),
        }),
    }
}

fn parse_match_field(value: &str) -> Result<MatchField> {
    match value {
        "title" => Ok(MatchField::Title),
        "tag" => Ok(MatchField::Tag),
        "both" => Ok(MatchField::Both),
        other => Err(DataError::RowDecode {
            field: "match_field",
            reason: format!("unknown match field '{other}'"),
        }),
    }
}

/// Map a [`PatternKind`] back to its stored string representation.
#[must_use]
pub const fn pattern_kind_to_str(kind: PatternKind) -> &'static str {
    match kind {
        PatternKind::Keyword => "keyword",
        PatternKind::Wildcard => "wildcard",
        PatternKind::Regex => "regex",
    }
}

/// Map a [`MatchField`] back to its stored string representation.
#[must_use]
pub const fn match_field_to_str(field: MatchField) -> &'static str {
    match field {
        MatchField::Title => "title",
        MatchField::Tag => "tag",
        MatchField::Both => "both",
    }
}

/// Row for the `rss_filter_association` table.
#[derive(Debug, Clone, FromRow)]
pub struct RssFilterAssociationRow {
    /// The RSS subscription side of the association.
    pub rss_id: i64,
    /// The filter rule side of the association.
    pub filter_rule_id: i64,
}

/// Downloader type, matching `Downloader Setting.type` in spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloaderType {
    /// qBittorrent WebUI v2.
    QBittorrent,
    /// Transmission JSON-RPC.
    Transmission,
}

impl DownloaderType {
    /// Parse the stored string representation.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::RowDecode`] for any value other than
    /// `"qbittorrent"` or `"transmission"`.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "qbittorrent" => Ok(Self::QBittorrent),
            "transmission" => Ok(Self::Transmission),
            other => Err(DataError::RowDecode {
                field: "type",
                reason: format!("unknown downloader type '{other}'"),
            }),
        }
    }

    /// Stored string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QBittorrent => "qbittorrent",
            Self::Transmission => "transmission",
        }
    }
}

/// Row for the `downloader_setting` table.
#[derive(Debug, Clone, FromRow)]
pub struct DownloaderSettingRow {
    /// Surrogate identifier.
    pub id: i64,
    /// Unique downloader name.
    pub name: String,
    /// `"qbittorrent"` or `"transmission"`.
    #[sqlx(rename = "type")]
    pub kind: String,
    /// Base WebUI/RPC URL.
    pub url: String,
    /// Login username.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Whether added torrents auto-start or require an explicit resume.
    pub auto_start: bool,
    /// Whether the cleanup/push paths may use this downloader.
    pub enabled: bool,
    /// Whether this is the default downloader for subscriptions without one.
    pub is_default: bool,
}

/// Cleanup scope, matching `Global Settings.cleanup.scope` in spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupScope {
    /// Only torrents known to the local store.
    Database,
    /// Torrents whose downloader label/tag intersects `scopeTags`.
    Tag,
    /// Every torrent known to the downloader.
    All,
}

impl CleanupScope {
    /// Parse the stored string representation, defaulting to `Database` for
    /// anything unrecognized rather than failing settings load outright.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "tag" => Self::Tag,
            "all" => Self::All,
            _ => Self::Database,
        }
    }
}

/// Composite condition mode, matching `Global Settings.cleanup.conditionMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionMode {
    /// Any active predicate triggers eviction.
    Or,
    /// Every active predicate must hold.
    And,
}

impl ConditionMode {
    /// Parse the stored string representation, defaulting to `Or`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "and" => Self::And,
            _ => Self::Or,
        }
    }
}

/// Row for the singleton `settings_global` table.
#[derive(Debug, Clone, FromRow)]
pub struct SettingsGlobalRow {
    /// Always `1`; the table holds exactly one row.
    pub id: i16,
    /// Fallback RSS poll interval in minutes.
    pub default_interval_minutes: i32,
    /// Fallback per-RSS worker concurrency.
    pub default_concurrency: i32,
    /// Root download directory.
    pub download_dir: String,
    /// Whether a global download speed cap is enforced.
    pub download_limit_enabled: bool,
    /// Global download speed cap in bytes/sec.
    pub download_speed_limit: i64,
    /// Maximum accepted torrent size in GB before a free-path item is skipped.
    pub torrent_size_gb: f64,
    /// Minimum remaining free-window minutes required to download.
    pub min_free_minutes: i32,
    /// Hours after which an un-pushed download is discarded.
    pub retain_hours: i32,
    /// Maximum push retry attempts before a `.torrent` file is discarded.
    pub max_retry: i32,
    /// Whether the cleanup engine runs at all.
    pub cleanup_enabled: bool,
    /// Cleanup loop interval in minutes (floor 5).
    pub cleanup_interval_min: i32,
    /// `"database"` / `"tag"` / `"all"`.
    pub cleanup_scope: String,
    /// Tags used by `cleanup_scope = "tag"`.
    pub cleanup_scope_tags: Vec<String>,
    /// `"and"` / `"or"`.
    pub condition_mode: String,
    /// Seed-time eviction threshold in hours.
    pub max_seed_time_h: f64,
    /// Ratio eviction threshold.
    pub min_ratio: f64,
    /// Inactivity eviction threshold in hours.
    pub max_inactive_h: f64,
    /// Slow-seed compound threshold: seed-time component, in hours.
    pub slow_seed_time_h: f64,
    /// Slow-seed compound threshold: maximum ratio component.
    pub slow_max_ratio: f64,
    /// Whether free-expired torrents (filter-path exempt ones aside) are evicted.
    pub del_free_expired: bool,
    /// Whether disk-space backpressure is enforced.
    pub disk_protect: bool,
    /// Free-space floor, in GB, that triggers backpressure.
    pub min_disk_space_gb: f64,
    /// Protect torrents that are still downloading/checking/queued.
    pub protect_dl: bool,
    /// Protect Hit & Run torrents.
    pub protect_hr: bool,
    /// Protect torrents added more recently than this many hours.
    pub min_retain_h: f64,
    /// Tags that exempt a torrent from cleanup regardless of other predicates.
    pub protect_tags: Vec<String>,
    /// Whether eviction also deletes the on-disk payload.
    pub remove_data: bool,
}

impl SettingsGlobalRow {
    /// Parsed [`CleanupScope`].
    #[must_use]
    pub fn cleanup_scope(&self) -> CleanupScope {
        CleanupScope::parse(&self.cleanup_scope)
    }

    /// Parsed [`ConditionMode`].
    #[must_use]
    pub fn condition_mode(&self) -> ConditionMode {
        ConditionMode::parse(&self.condition_mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_kind_round_trips() {
        for kind in [PatternKind::Keyword, PatternKind::Wildcard, PatternKind::Regex] {
            let s = pattern_kind_to_str(kind);
            assert_eq!(parse_pattern_kind(s).unwrap(), kind);
        }
    }

    #[test]
    fn match_field_round_trips() {
        for field in [MatchField::Title, MatchField::Tag, MatchField::Both] {
            let s = match_field_to_str(field);
            assert_eq!(parse_match_field(s).unwrap(), field);
        }
    }

    #[test]
    fn unknown_pattern_type_is_rejected() {
        assert!(parse_pattern_kind("bogus").is_err());
    }

    #[test]
    fn downloader_type_parses_known_variants() {
        assert_eq!(DownloaderType::parse("qbittorrent").unwrap(), DownloaderType::QBittorrent);
        assert_eq!(DownloaderType::parse("transmission").unwrap(), DownloaderType::Transmission);
        assert!(DownloaderType::parse("deluge").is_err());
    }

    #[test]
    fn cleanup_scope_defaults_to_database() {
        assert_eq!(CleanupScope::parse("unknown"), CleanupScope::Database);
        assert_eq!(CleanupScope::parse("tag"), CleanupScope::Tag);
    }
}
