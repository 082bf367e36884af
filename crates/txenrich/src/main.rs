//! txenrich CLI - enrich raw bank transactions with merchant, category and location data.
//!
//! Reads transactions from CSV, sends them to the enrichment service with
//! bounded concurrency, rate limiting and retries, and writes the structured
//! results plus a summary to the output directory.
//!
//! # Usage
//!
//! ```bash
//! # Enrich the default input file
//! txenrich enrich
//!
//! # Enrich a specific file as JSON Lines, 3 requests at a time
//! txenrich enrich -i data/march.csv -f jsonl -c 3
//!
//! # Check the input without calling the API
//! txenrich enrich --dry-run
//!
//! # View configuration
//! txenrich config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// txenrich - enrich raw bank transactions via the enrichment API.
#[derive(Parser, Debug)]
#[command(name = "txenrich")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Enrich transactions from a CSV file
    Enrich(cli::enrich::EnrichArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging from config, with CLI verbose override.
    // Note: logging isn't initialized yet, so use eprintln for config warnings.
    let config = match txenrich_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `txenrich config path`."
            );
            txenrich_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("txenrich v{}", txenrich_core::VERSION);

    // Dispatch to the appropriate command handler
    match cli.command {
        Commands::Enrich(args) => cli::enrich::execute(args).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
