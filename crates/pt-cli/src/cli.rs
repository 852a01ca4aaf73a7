//! Argument parsing and command dispatch.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use pt_core::Dependencies;
use pt_telemetry::{LoggingConfig, init_logging};
use tracing::info;

/// Automated PT-tracker RSS assistant.
#[derive(Debug, Parser)]
#[command(name = "pt-assistant", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run every enabled RSS subscription exactly once, then exit.
    Run,
    /// Run until interrupted, with tickers per subscription and hot
    /// configuration reload.
    Serve,
}

/// Parse arguments from the environment and dispatch to the selected
/// subcommand.
///
/// # Errors
///
/// Returns an error if logging cannot be initialised, dependency
/// construction fails, or the selected subcommand fails.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&LoggingConfig::default()).map_err(|err| anyhow!("failed to initialise logging: {err}"))?;

    let deps = Dependencies::from_env().await.context("failed to construct core dependencies")?;

    match cli.command {
        Command::Run => {
            info!("running a single scheduler pass");
            pt_core::run_once(&deps).await.context("scheduler pass failed")?;
        }
        Command::Serve => {
            info!("running in persistent mode, press ctrl-c to stop");
            pt_core::run_forever(deps, shutdown_signal()).await.context("persistent run failed")?;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to install ctrl-c handler, shutdown signal will never fire");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_subcommand_parses() {
        let cli = Cli::parse_from(["pt-assistant", "run"]);
        assert!(matches!(cli.command, Command::Run));
    }

    #[test]
    fn serve_subcommand_parses() {
        let cli = Cli::parse_from(["pt-assistant", "serve"]);
        assert!(matches!(cli.command, Command::Serve));
    }
}
