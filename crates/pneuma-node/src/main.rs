//! # pneuma-node entry point
//!
//! Parses command-line arguments and dispatches to the node's three
//! modes: `monitor` (run the watcher and status poller forever),
//! `process` (anchor a single file and exit), and `test` (print the
//! current ledger status as JSON).
//!
//! Startup connectivity checks are fatal in every mode: if the content
//! store or the ledger is unreachable the process exits with code 1
//! before doing any work.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pneuma_node::config::NodeConfig;
use pneuma_node::status::{run_status_poller, LedgerStatus};
use pneuma_node::watcher::DirectoryWatcher;
use pneuma_node::workflow::{AnchorOutcome, AnchoringWorkflow};

/// Breathing-analysis anchoring node.
///
/// Watches a pending directory for analysis records, stores each payload
/// in the content-addressed store, and anchors the content id on the
/// ledger contract.
#[derive(Parser, Debug)]
#[command(name = "pneuma-node", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the JSON configuration file.
    #[arg(long, global = true, default_value = "config/node.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch the pending directory and anchor records forever.
    Monitor,

    /// Anchor a single file and exit (code 0 on success, 1 on failure).
    Process {
        /// The JSON file to anchor.
        #[arg(long)]
        file: PathBuf,
    },

    /// Print the current ledger status as JSON.
    Test,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = NodeConfig::load(&cli.config)?;
    let store = config.build_store()?;
    let ledger = config.build_ledger()?;

    // Fatal startup connectivity checks: store reachable, ledger count
    // readable.
    store
        .health()
        .await
        .map_err(|e| anyhow::anyhow!("content store connectivity check failed: {e}"))?;
    let count = ledger
        .count()
        .await
        .map_err(|e| anyhow::anyhow!("ledger connectivity check failed: {e}"))?;
    tracing::info!(
        node_id = %config.node.id,
        network = %config.node.network,
        anchored_records = count,
        "connectivity checks passed"
    );

    let workflow = Arc::new(AnchoringWorkflow::new(store, ledger));

    match cli.command {
        Commands::Monitor => {
            let watcher = DirectoryWatcher::new(workflow.clone(), &config.storage, &config.watcher);

            tokio::spawn(run_status_poller(
                workflow,
                config.node.clone(),
                Duration::from_secs(config.watcher.status_interval_secs),
            ));

            tracing::info!(
                pending = %config.storage.pending_dir().display(),
                interval_secs = config.watcher.watch_interval_secs,
                "entering monitor loop"
            );
            watcher
                .run(Duration::from_secs(config.watcher.watch_interval_secs))
                .await;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Process { file } => {
            let contents = std::fs::read_to_string(&file)?;
            let value: serde_json::Value = serde_json::from_str(&contents)?;
            let record = pneuma_core::AnalysisRecord::from_value(value)?;

            match workflow.anchor(record).await {
                Ok(AnchorOutcome::Anchored(receipt)) => {
                    println!("{}", serde_json::to_string_pretty(&receipt)?);
                    Ok(ExitCode::SUCCESS)
                }
                Ok(AnchorOutcome::AlreadyAnchored { index, entry }) => {
                    tracing::info!(index, "record already anchored");
                    println!("{}", serde_json::to_string_pretty(&entry)?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    tracing::error!(file = %file.display(), "anchoring failed: {e}");
                    Ok(ExitCode::from(1))
                }
            }
        }

        Commands::Test => {
            let status = LedgerStatus::snapshot(&workflow, &config.node).await;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parse_monitor() {
        let cli = Cli::try_parse_from(["pneuma-node", "monitor"]).unwrap();
        assert!(matches!(cli.command, Commands::Monitor));
        assert_eq!(cli.config, PathBuf::from("config/node.json"));
    }

    #[test]
    fn cli_parse_process_requires_file() {
        let result = Cli::try_parse_from(["pneuma-node", "process"]);
        assert!(result.is_err());

        let cli =
            Cli::try_parse_from(["pneuma-node", "process", "--file", "pending/a.json"]).unwrap();
        if let Commands::Process { file } = cli.command {
            assert_eq!(file, PathBuf::from("pending/a.json"));
        } else {
            panic!("expected process command");
        }
    }

    #[test]
    fn cli_parse_test_mode() {
        let cli = Cli::try_parse_from(["pneuma-node", "test"]).unwrap();
        assert!(matches!(cli.command, Commands::Test));
    }

    #[test]
    fn cli_parse_verbose_levels() {
        let cli0 = Cli::try_parse_from(["pneuma-node", "test"]).unwrap();
        assert_eq!(cli0.verbose, 0);

        let cli1 = Cli::try_parse_from(["pneuma-node", "-v", "test"]).unwrap();
        assert_eq!(cli1.verbose, 1);

        let cli3 = Cli::try_parse_from(["pneuma-node", "-vvv", "test"]).unwrap();
        assert_eq!(cli3.verbose, 3);
    }

    #[test]
    fn cli_parse_config_option() {
        let cli = Cli::try_parse_from(["pneuma-node", "--config", "/etc/pneuma.json", "monitor"])
            .unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/pneuma.json"));
    }

    #[test]
    fn cli_parse_no_subcommand_errors() {
        assert!(Cli::try_parse_from(["pneuma-node"]).is_err());
    }

    #[test]
    fn cli_parse_invalid_subcommand_errors() {
        assert!(Cli::try_parse_from(["pneuma-node", "nonexistent"]).is_err());
    }
}
