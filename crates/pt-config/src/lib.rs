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

//! Typed configuration facade over the site/RSS/filter-rule/downloader
//! tables: [`ConfigService`] for point-in-time reads and mutations,
//! [`ConfigWatcher`] for hot-reload polling that publishes
//! `pt_events::Event::ConfigChanged`.

pub mod error;
pub mod model;
pub mod service;
pub mod validate;

pub use error::{ConfigError, Result};
pub use model::{
    ConfigSnapshot, DownloaderSetting, FilterRuleWithAssociations, GlobalSettings,
    RssSubscription, Site, SnapshotFingerprint, MAX_CONCURRENCY, MAX_INTERVAL_MINUTES,
    MIN_INTERVAL_MINUTES,
};
pub use service::{ConfigService, ConfigWatcher};
pub use validate::{validate_downloader_type, validate_filter_rule};
