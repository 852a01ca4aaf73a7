//! Database-backed configuration facade over the `pt-data` tables.

use std::collections::HashMap;
use std::time::Duration;

use pt_data::{
    DownloaderSettingRow, FilterRuleRow, RssFilterAssociationRow, RssSubscriptionRow,
    SettingsGlobalRow, SiteRow,
};
use pt_events::{Event, EventBus};
use sqlx::PgPool;
use tracing::{info, instrument};

use crate::error::{ConfigError, Result};
use crate::model::{
    ConfigSnapshot, DownloaderSetting, FilterRuleWithAssociations, GlobalSettings, RssSubscription,
    Site, SnapshotFingerprint,
};

const SELECT_SITES: &str = "SELECT * FROM site ORDER BY id";
const SELECT_SUBSCRIPTIONS: &str = "SELECT * FROM rss_subscription ORDER BY id";
const SELECT_FILTER_RULES: &str = "SELECT * FROM filter_rule ORDER BY priority ASC, id ASC";
const SELECT_ASSOCIATIONS: &str = "SELECT * FROM rss_filter_association";
const SELECT_DOWNLOADERS: &str = "SELECT * FROM downloader_setting ORDER BY id";
const SELECT_GLOBAL: &str = "SELECT * FROM settings_global WHERE id = 1";

/// Database-backed configuration service.
///
/// Owns a connection pool shared with `pt-store`; construction does not run
/// migrations — callers run `pt_data::MIGRATOR` (directly, or transitively
/// via `pt_store::TorrentStore::connect`) before handing the pool here.
#[derive(Clone)]
pub struct ConfigService {
    pool: PgPool,
}

impl ConfigService {
    /// Wrap an already-migrated connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Access the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Assemble a consistent snapshot of all configuration tables.
    ///
    /// # Errors
    ///
    /// Returns an error if any underlying query fails or a stored row
    /// fails to decode into its domain representation.
    #[instrument(name = "config_service.snapshot", skip(self))]
    pub async fn snapshot(&self) -> Result<ConfigSnapshot> {
        let site_rows: Vec<SiteRow> = sqlx::query_as(SELECT_SITES)
            .fetch_all(&self.pool)
            .await
            .map_err(|source| ConfigError::Database { operation: "select_sites", source })?;

        let subscription_rows: Vec<RssSubscriptionRow> = sqlx::query_as(SELECT_SUBSCRIPTIONS)
            .fetch_all(&self.pool)
            .await
            .map_err(|source| ConfigError::Database {
                operation: "select_subscriptions",
                source,
            })?;

        let rule_rows: Vec<FilterRuleRow> = sqlx::query_as(SELECT_FILTER_RULES)
            .fetch_all(&self.pool)
            .await
            .map_err(|source| ConfigError::Database { operation: "select_filter_rules", source })?;

        let association_rows: Vec<RssFilterAssociationRow> = sqlx::query_as(SELECT_ASSOCIATIONS)
            .fetch_all(&self.pool)
            .await
            .map_err(|source| ConfigError::Database { operation: "select_associations", source })?;

        let downloader_rows: Vec<DownloaderSettingRow> = sqlx::query_as(SELECT_DOWNLOADERS)
            .fetch_all(&self.pool)
            .await
            .map_err(|source| ConfigError::Database { operation: "select_downloaders", source })?;

        let global_row: SettingsGlobalRow = sqlx::query_as(SELECT_GLOBAL)
            .fetch_one(&self.pool)
            .await
            .map_err(|source| ConfigError::Database { operation: "select_global", source })?;

        let mut associations_by_rule: HashMap<i64, Vec<i64>> = HashMap::new();
        for assoc in association_rows {
            associations_by_rule.entry(assoc.filter_rule_id).or_default().push(assoc.rss_id);
        }

        let mut filter_rules = Vec::with_capacity(rule_rows.len());
        for row in rule_rows {
            let rule_id = row.id;
            let rule = pt_filter::FilterRule::try_from(row)?;
            let rss_associations = associations_by_rule.remove(&rule_id).unwrap_or_default();
            filter_rules.push(FilterRuleWithAssociations { rule, rss_associations });
        }

        Ok(ConfigSnapshot {
            sites: site_rows.into_iter().map(|row| Site { row }).collect(),
            subscriptions: subscription_rows
                .into_iter()
                .map(|row| RssSubscription { row })
                .collect(),
            filter_rules,
            downloaders: downloader_rows
                .into_iter()
                .map(|row| DownloaderSetting { row })
                .collect(),
            global: GlobalSettings { row: global_row },
        })
    }

    /// Take an initial snapshot and start a background-pollable watcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial snapshot fails.
    pub async fn watch(&self, poll_interval: Duration, events: EventBus) -> Result<(ConfigSnapshot, ConfigWatcher)> {
        let snapshot = self.snapshot().await?;
        let watcher = ConfigWatcher {
            service: self.clone(),
            events,
            poll_interval,
            last_fingerprint: snapshot.fingerprint(),
        };
        Ok((snapshot, watcher))
    }
}

/// Polls the configuration tables for changes and publishes
/// [`Event::ConfigChanged`] through the shared event bus when a change is
/// detected (§4.F "Hot reload").
pub struct ConfigWatcher {
    service: ConfigService,
    events: EventBus,
    poll_interval: Duration,
    last_fingerprint: SnapshotFingerprint,
}

impl ConfigWatcher {
    /// Block until a configuration change is observed, returning the new
    /// snapshot. Also publishes [`Event::ConfigChanged`] on the event bus.
    ///
    /// # Errors
    ///
    /// Returns an error if a poll's underlying query fails.
    pub async fn next(&mut self) -> Result<ConfigSnapshot> {
        loop {
            tokio::time::sleep(self.poll_interval).await;
            let snapshot = self.service.snapshot().await?;
            let fingerprint = snapshot.fingerprint();
            if fingerprint != self.last_fingerprint {
                self.last_fingerprint = fingerprint;
                info!("configuration change detected");
                self.events.publish(Event::ConfigChanged {
                    description: "configuration tables changed".to_string(),
                });
                return Ok(snapshot);
            }
        }
    }
}

