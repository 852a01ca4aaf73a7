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

//! Binary entrypoint for the `pt-assistant` CLI.

/// Parses arguments and dispatches to the selected subcommand.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pt_cli::run().await
}
