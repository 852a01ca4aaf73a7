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

//! Schema rows and migrations for the site/RSS/filter-rule/downloader
//! configuration tables.
//!
//! This crate owns everything a [`pt_config::ConfigService`] reads and
//! writes. Runtime torrent bookkeeping lives in `pt-store` instead, on its
//! own migrator and schema-version track.

pub mod error;
pub mod model;

pub use error::{DataError, Result as DataResult};
pub use model::{
    CleanupScope, ConditionMode, DownloaderSettingRow, DownloaderType, FilterRuleRow,
    RssFilterAssociationRow, RssSubscriptionRow, SettingsGlobalRow, SiteRow,
};

/// Embedded migrations for this crate's tables.
///
/// Running this migrator brings `schema_meta.version` to `2`; `pt-store`
/// carries its own migrator that brings it to `3`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();
