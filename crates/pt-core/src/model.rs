//! Domain types shared across the decision pipeline, push worker, and
//! free-end monitor.

use chrono::{DateTime, Utc};

/// One RSS feed item as reported by a site collaborator, prior to any
/// detail fetch.
#[derive(Debug, Clone)]
pub struct RssItem {
    /// Site-local torrent identifier, extracted from the item's GUID/link.
    pub torrent_id: String,
    /// Raw item title as published in the feed.
    pub title: String,
    /// RSS subscription tag this item was fetched under (drives the
    /// download sub-path).
    pub tag: String,
    /// Category label reported by the feed, if any.
    pub category: Option<String>,
}

/// Detail-page data fetched for a single torrent, used to evaluate
/// free/finishability and filter matching.
#[derive(Debug, Clone)]
pub struct TorrentDetail {
    /// Subtitle/secondary title used as the filter `tag` match field.
    pub subtitle: String,
    /// Whether the torrent is currently marked free by the site.
    pub is_free: bool,
    /// Free promotion level/category, if reported.
    pub free_level: Option<String>,
    /// When the free promotion ends, if the torrent is free.
    pub free_end_time: Option<DateTime<Utc>>,
    /// Size of the torrent payload in bytes.
    pub size_bytes: Option<i64>,
    /// Whether the site flags this torrent as subject to Hit-and-Run rules.
    pub has_hr: bool,
}

impl TorrentDetail {
    /// Whether there is enough remaining free time to plausibly finish
    /// downloading before the promotion ends, per spec.md §4.D's
    /// `minFreeMinutes` override.
    #[must_use]
    pub fn can_be_finished(&self, min_free_minutes: i64) -> bool {
        if !self.is_free {
            return false;
        }
        match self.remaining_free_minutes() {
            Some(remaining) => remaining >= min_free_minutes,
            None => true,
        }
    }

    /// Minutes remaining until the free promotion ends, if a deadline is
    /// known. `None` means the promotion has no reported end time.
    #[must_use]
    pub fn remaining_free_minutes(&self) -> Option<i64> {
        self.free_end_time.map(|end| {
            let delta = end - Utc::now();
            delta.num_minutes().max(0)
        })
    }
}

/// Running tally of decision-pipeline outcomes for a single RSS tick,
/// mirroring `pt_telemetry::DecisionOutcome`'s label set.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionCounters {
    /// Total items considered, including skipped and already-pushed ones.
    pub total: u64,
    /// Items that were free at evaluation time.
    pub free: u64,
    /// Items for which a `.torrent` file was successfully downloaded.
    pub downloaded: u64,
    /// Items skipped by de-dup, free/finishability, or filter evaluation.
    pub skipped: u64,
    /// Items for which the detail fetch failed.
    pub detail_failed: u64,
    /// Items that matched for download but whose `.torrent` fetch failed.
    pub download_failed: u64,
}

impl DecisionCounters {
    /// Build an all-zero counter set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            total: 0,
            free: 0,
            downloaded: 0,
            skipped: 0,
            detail_failed: 0,
            download_failed: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn detail(is_free: bool, free_end_time: Option<DateTime<Utc>>) -> TorrentDetail {
        TorrentDetail {
            subtitle: "subtitle".to_string(),
            is_free,
            free_level: None,
            free_end_time,
            size_bytes: Some(1_000),
            has_hr: false,
        }
    }

    #[test]
    fn not_free_cannot_finish() {
        assert!(!detail(false, None).can_be_finished(10));
    }

    #[test]
    fn free_with_no_end_time_can_finish() {
        assert!(detail(true, None).can_be_finished(60));
    }

    #[test]
    fn free_with_enough_remaining_time_can_finish() {
        let end = Utc::now() + Duration::minutes(120);
        assert!(detail(true, Some(end)).can_be_finished(60));
    }

    #[test]
    fn free_with_insufficient_remaining_time_cannot_finish() {
        let end = Utc::now() + Duration::minutes(5);
        assert!(!detail(true, Some(end)).can_be_finished(60));
    }

    #[test]
    fn remaining_free_minutes_never_negative() {
        let end = Utc::now() - Duration::minutes(5);
        assert_eq!(detail(true, Some(end)).remaining_free_minutes(), Some(0));
    }
}
