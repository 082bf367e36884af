//! The `txenrich enrich` command: CSV in, enriched JSON out.

mod report;
mod types;

pub use types::OutputFormat;

use clap::Args;
use std::path::PathBuf;
use std::time::Duration;
use txenrich_core::output::file_stamp;
use txenrich_core::{load_csv, Config, ConfigError, Enricher, InputError, ResultStore};

/// Rows shown by `--dry-run`.
const PREVIEW_ROWS: usize = 5;
/// Rows shown in the results table after a run.
const TABLE_ROWS: usize = 15;

/// Arguments for the `enrich` command.
#[derive(Args, Debug)]
pub struct EnrichArgs {
    /// CSV file with `country,type,title[,comment]` columns
    #[arg(short, long, default_value = "data/transactions.csv")]
    pub input: PathBuf,

    /// Directory for result and summary files [default: from config]
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Results file format [default: from config]
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Maximum concurrent requests
    #[arg(short = 'c', long)]
    pub max_concurrent: Option<usize>,

    /// Minimum gap between two requests, in milliseconds
    #[arg(long)]
    pub request_delay_ms: Option<u64>,

    /// Maximum attempts per transaction, including the first
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// API key (overrides the config file)
    #[arg(short = 'k', long, env = "TRIQAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Validate the input and preview the first rows without calling the API
    #[arg(long)]
    pub dry_run: bool,

    /// Pretty-print the JSON results file [default: from config]
    #[arg(long, conflicts_with = "compact")]
    pub pretty: bool,

    /// Write the JSON results file without indentation
    #[arg(long)]
    pub compact: bool,
}

/// Execute the enrich command.
pub async fn execute(args: EnrichArgs) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    apply_overrides(&mut config, &args);
    config.validate()?;

    let loaded = match load_csv(&args.input) {
        Ok(loaded) => loaded,
        Err(e @ InputError::FileNotFound(_)) => {
            anyhow::bail!(
                "{e}\n\n  \
                 Hint: pass the file with `--input path/to/transactions.csv`.\n  \
                 Expected columns: country,type,title[,comment]"
            );
        }
        Err(e) => return Err(e.into()),
    };

    if !loaded.rejected.is_empty() {
        tracing::warn!(
            "Skipped {} invalid row(s) in {:?}",
            loaded.rejected.len(),
            args.input
        );
    }
    let transactions = loaded.transactions;
    if transactions.is_empty() {
        tracing::warn!("No valid transactions found in {:?}", args.input);
        return Ok(());
    }
    tracing::info!("Loaded {} transactions from {:?}", transactions.len(), args.input);

    if args.dry_run {
        eprintln!();
        eprint!("{}", report::render_preview(&transactions, PREVIEW_ROWS));
        eprintln!();
        eprintln!(
            "  Dry run: {} transactions would be sent with concurrency {}",
            transactions.len(),
            config.client.concurrency_limit
        );
        return Ok(());
    }

    let enricher = match Enricher::from_config(&config) {
        Ok(enricher) => enricher,
        Err(ConfigError::MissingApiKey) => {
            anyhow::bail!(
                "{}\n\n  \
                 Hint: export TRIQAI_API_KEY=... or set api_key in {}",
                ConfigError::MissingApiKey,
                Config::default_path().display()
            );
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(
        "Enriching {} transactions (concurrency {}, {}ms between requests)",
        transactions.len(),
        config.client.concurrency_limit,
        config.client.request_delay_ms
    );

    let progress = create_progress_bar(transactions.len() as u64);
    let set = enricher
        .enrich_many_with_progress(&transactions, |done, _| {
            progress.set_position(done as u64);
        })
        .await;
    progress.finish_and_clear();

    let format = resolve_format(&config, args.format);
    let store = ResultStore::new(config.output_dir())?;
    let stamp = file_stamp();
    let results_path = store.save_results(&set.results, format, config.output.pretty, &stamp)?;
    let summary_path = store.save_summary(&set.stats, &stamp)?;

    eprintln!();
    eprint!("{}", report::render_table(&set.results, TABLE_ROWS));
    eprint!("{}", report::render_summary(&set.stats));
    if let Some(line) = report::render_rate_limit(set.stats.rate_limit.as_ref()) {
        eprintln!("{line}");
    }
    eprintln!();
    eprintln!("  Results: {}", results_path.display());
    eprintln!("  Summary: {}", summary_path.display());

    if let Some(fatal) = set.fatal {
        anyhow::bail!(
            "Enrichment stopped early: {fatal}\n\n  \
             Hint: check that TRIQAI_API_KEY is valid and the account has credits.\n  \
             Results received before the failure were saved."
        );
    }

    Ok(())
}

/// CLI flags win over config file and environment values.
fn apply_overrides(config: &mut Config, args: &EnrichArgs) {
    if let Some(dir) = &args.output_dir {
        config.output.dir = dir.to_string_lossy().into_owned();
    }
    if let Some(format) = args.format {
        config.output.format = format.to_string();
    }
    if let Some(limit) = args.max_concurrent {
        config.client.concurrency_limit = limit;
    }
    if let Some(delay) = args.request_delay_ms {
        config.client.request_delay_ms = delay;
    }
    if let Some(attempts) = args.max_attempts {
        config.retry.max_attempts = attempts;
    }
    if args.pretty {
        config.output.pretty = true;
    } else if args.compact {
        config.output.pretty = false;
    }
    if let Some(key) = args.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        config.api.api_key = key.to_string();
    }
}

fn resolve_format(config: &Config, flag: Option<OutputFormat>) -> txenrich_core::OutputFormat {
    match flag {
        Some(format) => format.into(),
        None => txenrich_core::OutputFormat::parse(&config.output.format)
            .unwrap_or(txenrich_core::OutputFormat::Json),
    }
}

/// Create a progress bar for the enrichment run.
fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: EnrichArgs,
    }

    fn parse(argv: &[&str]) -> EnrichArgs {
        let mut full = vec!["txenrich"];
        full.extend_from_slice(argv);
        TestCli::try_parse_from(full).unwrap().args
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert_eq!(args.input, PathBuf::from("data/transactions.csv"));
        assert!(args.format.is_none());
        assert!(!args.dry_run);
    }

    #[test]
    fn test_flags_override_config() {
        let args = parse(&[
            "-i", "in.csv", "-o", "out", "-f", "jsonl", "-c", "2",
            "--request-delay-ms", "250", "--max-attempts", "5", "-k", "tq_flag",
        ]);
        let mut config = Config::default();
        apply_overrides(&mut config, &args);

        assert_eq!(config.output.dir, "out");
        assert_eq!(config.output.format, "jsonl");
        assert_eq!(config.client.concurrency_limit, 2);
        assert_eq!(config.client.request_delay_ms, 250);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.api.api_key, "tq_flag");
        assert_eq!(
            resolve_format(&config, args.format),
            txenrich_core::OutputFormat::JsonLines
        );
    }

    #[test]
    fn test_pretty_flags_override_config() {
        let mut config = Config::default();
        assert!(config.output.pretty);
        apply_overrides(&mut config, &parse(&["--compact"]));
        assert!(!config.output.pretty);

        apply_overrides(&mut config, &parse(&["--pretty"]));
        assert!(config.output.pretty);

        config.output.pretty = false;
        apply_overrides(&mut config, &parse(&[]));
        assert!(!config.output.pretty);
    }

    #[test]
    fn test_pretty_and_compact_conflict() {
        let argv = ["txenrich", "--pretty", "--compact"];
        assert!(TestCli::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_zero_concurrency_fails_validation() {
        let args = parse(&["-c", "0"]);
        let mut config = Config::default();
        apply_overrides(&mut config, &args);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_format_falls_back_to_config() {
        let mut config = Config::default();
        config.output.format = "jsonl".to_string();
        assert_eq!(
            resolve_format(&config, None),
            txenrich_core::OutputFormat::JsonLines
        );
        assert_eq!(
            resolve_format(&config, Some(OutputFormat::Json)),
            txenrich_core::OutputFormat::Json
        );
    }
}
