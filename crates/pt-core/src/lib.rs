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

//! Orchestration core: the decision pipeline, push worker, RSS scheduler,
//! free-end monitor, and cleanup engine, wired together by `bootstrap`.
//!
//! Layout: `model.rs` (shared domain types), `site.rs` (external site
//! collaborator boundary), `decision.rs` (§4.D), `push.rs` (§4.E),
//! `rss.rs` (§4.F), `free_end.rs` (§4.G), `cleanup.rs` (§4.H),
//! `bootstrap.rs` (dependency construction and run modes).

/// Dependency construction and top-level run modes.
pub mod bootstrap;
/// Cleanup engine: scoped candidate enumeration, protection rules, and
/// removal.
pub mod cleanup;
/// Decision pipeline: de-dup, free/finishability, filter evaluation, and
/// `.torrent` download.
pub mod decision;
/// Aggregate error type for core orchestration.
pub mod error;
/// Free-end monitor: single-timer pause scheduling.
pub mod free_end;
/// Shared domain types.
pub mod model;
/// Push worker: gates a downloaded `.torrent` file before pushing it to a
/// downloader.
pub mod push;
/// RSS scheduler: per-subscription tickers with hot reload.
pub mod rss;
/// Boundary trait for the external site collaborator.
pub mod site;

pub use bootstrap::{Dependencies, run_forever, run_once};
pub use error::{CoreError, Result};
