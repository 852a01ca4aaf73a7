//! Domain types for filter rules and match queries.

use chrono::{DateTime, Utc};

/// How a rule's pattern is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// Case-insensitive substring match against the relevant field(s).
    Keyword,
    /// Shell-style glob: `*` = any run of characters (incl. empty), `?` = exactly one character.
    Wildcard,
    /// User-supplied regular expression, compiled case-insensitively by default.
    Regex,
}

/// Which input field(s) a rule is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchField {
    /// Match against the title only.
    Title,
    /// Match against the tag only.
    Tag,
    /// Match if either the title or the tag matches. Default when unset.
    #[default]
    Both,
}

/// A single user-authored filter rule, as consumed by the matcher cache.
///
/// Mirrors the `Filter Rule` entity in the data model: `id` and `priority`
/// order resolution (`priority` ascending, `id` ascending on ties),
/// `site_id`/`rss_id` scope a rule to a site or RSS subscription when set,
/// and `None` in both means the rule is global.
#[derive(Debug, Clone)]
pub struct FilterRule {
    /// Surrogate identifier.
    pub id: i64,
    /// Unique rule name.
    pub name: String,
    /// Raw pattern text, interpreted per `pattern_kind`.
    pub pattern: String,
    /// How `pattern` is interpreted.
    pub pattern_kind: PatternKind,
    /// Which field(s) the pattern is evaluated against.
    pub match_field: MatchField,
    /// If `true`, a match only authorizes download when the torrent is free.
    pub require_free: bool,
    /// Disabled rules are excluded from the compiled cache entirely.
    pub enabled: bool,
    /// Lower values take precedence; ties broken by lower `id`.
    pub priority: i32,
    /// Restricts the rule to a single site when set.
    pub site_id: Option<i64>,
    /// Restricts the rule to a single RSS subscription when set.
    pub rss_id: Option<i64>,
    /// Creation timestamp, retained for display purposes only.
    pub created_at: DateTime<Utc>,
}

/// Title/tag pair a rule is evaluated against.
#[derive(Debug, Clone, Default)]
pub struct MatchInput {
    /// Torrent title as reported by the RSS item or detail page.
    pub title: String,
    /// Torrent tag/subtitle, when present.
    pub tag: String,
}

impl MatchInput {
    /// Build an input with only a title, leaving the tag empty.
    #[must_use]
    pub fn title_only(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            tag: String::new(),
        }
    }
}

/// Result of evaluating the matcher cache against a title/tag pair.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    /// Whether any rule matched.
    pub matched: bool,
    /// The matched rule, when one was found.
    pub rule: Option<FilterRule>,
    /// `matched && (!rule.require_free || is_free)` — spec.md §4.A.
    pub should_download: bool,
}
