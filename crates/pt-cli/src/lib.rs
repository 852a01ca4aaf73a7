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
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Command-line surface over `pt-core` (spec.md §6): a one-shot mode that
//! runs a single scheduler pass and exits, and a persistent mode that keeps
//! running until cancelled.
//!
//! Layout: `cli.rs` (argument parsing, command dispatch) with a thin
//! `main.rs` that delegates to `run()`.

pub mod cli;

pub use cli::run;
