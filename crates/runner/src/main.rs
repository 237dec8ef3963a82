//! Snowball CLI
//!
//! `snowball run` expands the seed dataset by one citation round.
//! `snowball resolve-ids` builds that seed dataset from a list of titles.

use anyhow::Context;
use clap::{Parser, Subcommand};
use snowball_common::config::ObservabilityConfig;
use snowball_common::scholar::create_client;
use snowball_common::{metrics, AppConfig, VERSION};
use snowball_runner::{IdLookup, RunController, RunError};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "snowball", version, about = "Citation snowballing for literature reviews")]
struct Cli {
    /// Configuration file (defaults to config/ layering plus APP__ env vars)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one snowballing round, resuming from a checkpoint if present
    Run {
        /// Seed dataset with a PaperId column
        #[arg(long)]
        input: Option<PathBuf>,
        /// Discovery dataset to write
        #[arg(long)]
        output: Option<PathBuf>,
        /// Checkpoint snapshot location
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },
    /// Resolve paper titles to service ids
    #[command(name = "resolve-ids", alias = "resolve_ids")]
    ResolveIds {
        /// CSV with Title and optional Publication Year columns
        #[arg(long)]
        input: Option<PathBuf>,
        /// Resolved dataset to write
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            return ExitCode::from(1);
        }
    };

    init_tracing(&config.observability);
    metrics::register_metrics();
    info!("Starting Snowball v{}", VERSION);

    match execute(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e.downcast_ref::<RunError>().map_or(1, RunError::exit_code);
            error!(error = %format!("{:#}", e), "Run halted");
            eprintln!("{:#}", e);
            ExitCode::from(code as u8)
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(&path.to_string_lossy())
            .with_context(|| format!("reading {}", path.display()))?,
        None => AppConfig::load()?,
    };
    Ok(config)
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&observability.log_level));

    if observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

async fn execute(command: Command, mut config: AppConfig) -> anyhow::Result<()> {
    let client = create_client(&config.scholar.provider, &config.scholar).map_err(RunError::from)?;
    info!(client = client.name(), "Metadata client ready");

    match command {
        Command::Run {
            input,
            output,
            checkpoint,
        } => {
            if let Some(input) = input {
                config.paths.input = input;
            }
            if let Some(output) = output {
                config.paths.output = output;
            }
            if let Some(checkpoint) = checkpoint {
                config.paths.checkpoint = checkpoint;
            }

            let summary = RunController::new(client, &config).run().await?;
            println!("{}", summary);
            println!("Output saved to: {}", config.paths.output.display());
            println!("Stats saved to: {}", config.paths.stats_path().display());
        }
        Command::ResolveIds { input, output } => {
            let input = input.unwrap_or_else(|| config.lookup.input.clone());
            let output = output.unwrap_or_else(|| config.lookup.output.clone());

            let summary = IdLookup::new(client, &config.lookup)
                .resolve_file(&input, &output)
                .await?;
            println!(
                "Resolved {} of {} titles ({} manual, {} not found, {} errors)",
                summary.resolved + summary.manual,
                summary.total,
                summary.manual,
                summary.not_found,
                summary.errors
            );
            println!("Saved: {}", output.display());
        }
    }

    Ok(())
}
