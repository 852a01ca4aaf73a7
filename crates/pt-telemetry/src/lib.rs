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

//! Structured logging initialisation and Prometheus counters for the
//! decision pipeline, push worker, and cleanup engine.
//!
//! Layout: `init.rs` (logging setup), `metrics.rs` (Prometheus registry).

pub mod error;
pub mod init;
pub mod metrics;

pub use error::{Result as TelemetryResult, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging, log_format_from_config};
pub use metrics::{CleanupOutcome, DecisionOutcome, Metrics, PushOutcome};
