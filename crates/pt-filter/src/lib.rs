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
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! Filter matcher cache (spec component A).
//!
//! Compiles enabled rules into regexes once, under a writer lock, and answers
//! match queries against a read-locked snapshot without ever holding the lock
//! across I/O. Pattern kinds: `keyword` (escaped substring), `wildcard` (`*`/`?`
//! translated to `.*`/`.`), `regex` (user pattern, compiled as-is). All three
//! compile case-insensitively.

mod error;
pub mod model;

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use regex::RegexBuilder;

pub use error::{FilterError, Result};
pub use model::{FilterRule, MatchField, MatchInput, MatchOutcome, PatternKind};

/// Maximum accepted pattern length, in characters.
pub const MAX_PATTERN_LEN: usize = 4096;

/// Validate a pattern before it is persisted, independent of compilation.
///
/// # Errors
///
/// Returns [`FilterError::EmptyPattern`] for an empty/whitespace-only pattern,
/// [`FilterError::PatternTooLong`] when it exceeds [`MAX_PATTERN_LEN`]
/// characters, or [`FilterError::InvalidPattern`] if it cannot compile for the
/// given `kind`.
pub fn validate(kind: PatternKind, pattern: &str) -> Result<()> {
    if pattern.trim().is_empty() {
        return Err(FilterError::EmptyPattern);
    }
    let len = pattern.chars().count();
    if len > MAX_PATTERN_LEN {
        return Err(FilterError::PatternTooLong {
            len,
            max: MAX_PATTERN_LEN,
        });
    }
    compile_pattern(kind, pattern)?;
    Ok(())
}

fn compile_pattern(kind: PatternKind, pattern: &str) -> Result<regex::Regex> {
    let source = match kind {
        PatternKind::Keyword => regex::escape(pattern),
        PatternKind::Wildcard => wildcard_to_regex(pattern),
        PatternKind::Regex => pattern.to_string(),
    };
    RegexBuilder::new(&source)
        .case_insensitive(true)
        .build()
        .map_err(|source| FilterError::InvalidPattern { source })
}

/// Escape every regex metacharacter in `pattern` except `*` and `?`, then
/// re-introduce those two as `.*` and `.` respectively.
fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out
}

struct CompiledMatcher {
    rule: FilterRule,
    title: Option<regex::Regex>,
    tag: Option<regex::Regex>,
}

impl CompiledMatcher {
    fn matches(&self, input: &MatchInput) -> bool {
        match self.rule.match_field {
            MatchField::Title => self.title.as_ref().is_some_and(|re| re.is_match(&input.title)),
            MatchField::Tag => self.tag.as_ref().is_some_and(|re| re.is_match(&input.tag)),
            MatchField::Both => {
                self.title.as_ref().is_some_and(|re| re.is_match(&input.title))
                    || self.tag.as_ref().is_some_and(|re| re.is_match(&input.tag))
            }
        }
    }

    fn in_scope(&self, site_id: Option<i64>, rss_id: Option<i64>) -> bool {
        let is_global = self.rule.site_id.is_none() && self.rule.rss_id.is_none();
        is_global
            || (self.rule.site_id.is_some() && self.rule.site_id == site_id)
            || (self.rule.rss_id.is_some() && self.rule.rss_id == rss_id)
    }
}

#[derive(Default)]
struct Snapshot {
    matchers: Vec<CompiledMatcher>,
    associations: HashMap<i64, HashSet<i64>>,
}

/// Compiled, priority-ordered view over the currently enabled filter rules.
pub struct FilterMatcherCache {
    snapshot: RwLock<Snapshot>,
}

impl FilterMatcherCache {
    /// Build an empty cache. Call [`FilterMatcherCache::refresh_cache`] to
    /// populate it before matching.
    #[must_use]
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Snapshot::default()),
        }
    }

    /// Atomically rebuild the compiled matchers and association index.
    ///
    /// Disabled rules are dropped. A rule whose pattern no longer compiles
    /// (it should have been rejected at creation time by [`validate`]) is
    /// skipped with a warning rather than failing the whole refresh — matching
    /// itself never errors, per spec.md §4.A.
    ///
    /// # Panics
    ///
    /// Panics if the internal snapshot lock has been poisoned.
    pub fn refresh_cache(&self, rules: Vec<FilterRule>, associations: &[(i64, i64)]) {
        let mut matchers: Vec<CompiledMatcher> = rules
            .into_iter()
            .filter(|rule| rule.enabled)
            .filter_map(|rule| {
                let title = matches!(rule.match_field, MatchField::Title | MatchField::Both)
                    .then(|| compile_pattern(rule.pattern_kind, &rule.pattern))
                    .transpose();
                let tag = matches!(rule.match_field, MatchField::Tag | MatchField::Both)
                    .then(|| compile_pattern(rule.pattern_kind, &rule.pattern))
                    .transpose();
                match (title, tag) {
                    (Ok(title), Ok(tag)) => Some(CompiledMatcher { rule, title, tag }),
                    _ => {
                        tracing::warn!(rule = rule.name.as_str(), "dropping rule with pattern that failed to compile during refresh");
                        None
                    }
                }
            })
            .collect();
        matchers.sort_by_key(|matcher| (matcher.rule.priority, matcher.rule.id));

        let mut index: HashMap<i64, HashSet<i64>> = HashMap::new();
        for (rss_id, rule_id) in associations {
            index.entry(*rss_id).or_default().insert(*rule_id);
        }

        let mut guard = self.snapshot.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Snapshot {
            matchers,
            associations: index,
        };
    }

    /// Find the highest-priority rule matching `input`, optionally scoped to
    /// a site and/or RSS subscription. Globals (rules with no site/RSS) are
    /// always considered.
    ///
    /// # Panics
    ///
    /// Panics if the internal snapshot lock has been poisoned.
    #[must_use]
    pub fn match_rules_with_input(
        &self,
        input: &MatchInput,
        site_id: Option<i64>,
        rss_id: Option<i64>,
    ) -> Option<FilterRule> {
        let guard = self.snapshot.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard
            .matchers
            .iter()
            .find(|matcher| matcher.in_scope(site_id, rss_id) && matcher.matches(input))
            .map(|matcher| matcher.rule.clone())
    }

    /// Convenience wrapper over [`FilterMatcherCache::match_rules_with_input`]
    /// for title-only callers.
    #[must_use]
    pub fn match_rules(&self, title: &str, site_id: Option<i64>, rss_id: Option<i64>) -> Option<FilterRule> {
        self.match_rules_with_input(&MatchInput::title_only(title), site_id, rss_id)
    }

    /// Find the highest-priority rule matching `input` among only the rules
    /// associated with `rss_id`. Globals are **not** implicitly included.
    ///
    /// # Panics
    ///
    /// Panics if the internal snapshot lock has been poisoned.
    #[must_use]
    pub fn match_rules_for_rss_with_input(&self, input: &MatchInput, rss_id: i64) -> Option<FilterRule> {
        let guard = self.snapshot.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(associated) = guard.associations.get(&rss_id) else {
            return None;
        };
        guard
            .matchers
            .iter()
            .find(|matcher| associated.contains(&matcher.rule.id) && matcher.matches(input))
            .map(|matcher| matcher.rule.clone())
    }

    /// Convenience wrapper over
    /// [`FilterMatcherCache::match_rules_for_rss_with_input`] for title-only
    /// callers.
    #[must_use]
    pub fn match_rules_for_rss(&self, title: &str, rss_id: i64) -> Option<FilterRule> {
        self.match_rules_for_rss_with_input(&MatchInput::title_only(title), rss_id)
    }

    /// Evaluate the dual free/filter gate for a torrent title (spec.md §4.A):
    /// `should_download = matched && (!rule.require_free || is_free)`.
    ///
    /// # Panics
    ///
    /// Panics if the internal snapshot lock has been poisoned.
    #[must_use]
    pub fn match_torrent(
        &self,
        title: &str,
        is_free: bool,
        site_id: Option<i64>,
        rss_id: Option<i64>,
    ) -> MatchOutcome {
        outcome_from(self.match_rules(title, site_id, rss_id), is_free)
    }

    /// Like [`FilterMatcherCache::match_torrent`] but scoped to an RSS's
    /// associated rules only, and honoring `match_field` via a full
    /// title/tag [`MatchInput`].
    ///
    /// # Panics
    ///
    /// Panics if the internal snapshot lock has been poisoned.
    #[must_use]
    pub fn should_download_for_rss_with_input(&self, input: &MatchInput, is_free: bool, rss_id: i64) -> MatchOutcome {
        outcome_from(self.match_rules_for_rss_with_input(input, rss_id), is_free)
    }
}

fn outcome_from(rule: Option<FilterRule>, is_free: bool) -> MatchOutcome {
    match rule {
        None => MatchOutcome::default(),
        Some(rule) => {
            let should_download = !rule.require_free || is_free;
            MatchOutcome {
                matched: true,
                should_download,
                rule: Some(rule),
            }
        }
    }
}

impl Default for FilterMatcherCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rule(id: i64, name: &str, priority: i32, pattern: &str) -> FilterRule {
        FilterRule {
            id,
            name: name.to_string(),
            pattern: pattern.to_string(),
            pattern_kind: PatternKind::Keyword,
            match_field: MatchField::Both,
            require_free: false,
            enabled: true,
            priority,
            site_id: None,
            rss_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn validate_rejects_empty_and_too_long_patterns() {
        assert!(matches!(
            validate(PatternKind::Keyword, "   "),
            Err(FilterError::EmptyPattern)
        ));
        let huge = "a".repeat(MAX_PATTERN_LEN + 1);
        assert!(matches!(
            validate(PatternKind::Keyword, &huge),
            Err(FilterError::PatternTooLong { .. })
        ));
        assert!(matches!(
            validate(PatternKind::Regex, "(unterminated"),
            Err(FilterError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn wildcard_compiles_star_and_question_mark() {
        let re = compile_pattern(PatternKind::Wildcard, "foo*.s0?e??").unwrap();
        assert!(re.is_match("foo.bar.s01e02"));
        assert!(!re.is_match("bar.s01e02"));
    }

    // S1 — Priority resolution.
    #[test]
    fn priority_resolution_picks_lowest_priority() {
        let cache = FilterMatcherCache::new();
        cache.refresh_cache(
            vec![
                rule(1, "A", 200, "test"),
                rule(2, "B", 10, "test"),
                rule(3, "C", 100, "test"),
            ],
            &[],
        );
        let matched = cache.match_rules("test title", None, None).unwrap();
        assert_eq!(matched.name, "B");
        assert_eq!(matched.priority, 10);
    }

    // S2 — Require-free gate.
    #[test]
    fn require_free_gates_should_download() {
        let cache = FilterMatcherCache::new();
        let mut r = rule(1, "A", 10, "test");
        r.require_free = true;
        cache.refresh_cache(vec![r], &[]);

        let blocked = cache.match_torrent("test title", false, None, None);
        assert!(blocked.matched);
        assert!(!blocked.should_download);

        let allowed = cache.match_torrent("test title", true, None, None);
        assert!(allowed.should_download);
    }

    // S3 — Multi-field tag-only.
    #[test]
    fn tag_only_match_field_ignores_title() {
        let cache = FilterMatcherCache::new();
        let mut r = rule(1, "A", 10, "REMUX");
        r.match_field = MatchField::Tag;
        cache.refresh_cache(vec![r], &[]);

        let no_match = cache.match_rules_with_input(
            &MatchInput {
                title: "Movie REMUX".to_string(),
                tag: "other".to_string(),
            },
            None,
            None,
        );
        assert!(no_match.is_none());

        let matched = cache.match_rules_with_input(
            &MatchInput {
                title: "Movie".to_string(),
                tag: "REMUX".to_string(),
            },
            None,
            None,
        );
        assert!(matched.is_some());
    }

    // S4 — RSS scoping.
    #[test]
    fn rss_scoping_excludes_unassociated_rules() {
        let cache = FilterMatcherCache::new();
        let global = rule(1, "G", 10, "test");
        let scoped = rule(2, "A", 20, "test");
        cache.refresh_cache(vec![global, scoped], &[(1, 2)]);

        let matched = cache.match_rules_for_rss("test title", 1).unwrap();
        assert_eq!(matched.name, "A");

        assert!(cache.match_rules_for_rss("test title", 2).is_none());
    }

    #[test]
    fn disabled_rules_are_excluded_from_refresh() {
        let cache = FilterMatcherCache::new();
        let mut r = rule(1, "A", 10, "test");
        r.enabled = false;
        cache.refresh_cache(vec![r], &[]);
        assert!(cache.match_rules("test title", None, None).is_none());
    }

    #[test]
    fn ties_break_on_lower_id() {
        let cache = FilterMatcherCache::new();
        cache.refresh_cache(vec![rule(2, "B", 10, "test"), rule(1, "A", 10, "test")], &[]);
        let matched = cache.match_rules("test title", None, None).unwrap();
        assert_eq!(matched.name, "A");
    }
}
