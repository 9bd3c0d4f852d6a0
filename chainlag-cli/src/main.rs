//! ChainLag CLI — correlate an on-chain metric with price.
//!
//! Commands:
//! - `run` — fetch the metric and price series, correlate, save artifacts
//! - `verify-key` — check that Etherscan accepts the configured API key

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use chainlag_core::data::SystemClock;
use chainlag_runner::{
    build_fetcher, build_sources, run_analysis, save_artifacts, verify_api_key, AnalysisConfig,
    MetricKind, RunOutcome,
};

#[derive(Parser)]
#[command(
    name = "chainlag",
    about = "ChainLag CLI — on-chain activity vs. price correlation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch both series, correlate, and write results.csv + report.json.
    Run {
        /// Path to a TOML config file. Without it, --start and --end are required.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Start date (YYYY-MM-DD). Overrides the config file.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Overrides the config file.
        #[arg(long)]
        end: Option<String>,

        /// Metric: daily_tx or total_supply. Overrides the config file.
        #[arg(long)]
        metric: Option<String>,

        /// Output directory. Overrides [output] dir.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Run the Etherscan API key pre-flight check only.
    VerifyKey {
        /// Path to a TOML config file (for base URL, key, and fetch settings).
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            start,
            end,
            metric,
            output_dir,
        } => run_cmd(config, start, end, metric, output_dir),
        Commands::VerifyKey { config } => verify_key_cmd(config.as_deref()),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn load_config(
    path: Option<&Path>,
    start: Option<&str>,
    end: Option<&str>,
    metric: Option<&str>,
    output_dir: Option<&Path>,
) -> Result<AnalysisConfig> {
    let mut config = match path {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => {
            let (Some(start), Some(end)) = (start, end) else {
                bail!("--start and --end are required without --config");
            };
            AnalysisConfig::for_range(parse_date(start)?, parse_date(end)?, MetricKind::DailyTx)
        }
    };

    if let Some(start) = start {
        config.analysis.start_date = parse_date(start)?;
    }
    if let Some(end) = end {
        config.analysis.end_date = parse_date(end)?;
    }
    if let Some(metric) = metric {
        config.analysis.metric = metric.parse()?;
    }
    // part of the run id, so it must match where artifacts land
    if let Some(dir) = output_dir {
        config.output.dir = dir.to_path_buf();
    }
    config.validate()?;
    Ok(config)
}

fn run_cmd(
    config_path: Option<PathBuf>,
    start: Option<String>,
    end: Option<String>,
    metric: Option<String>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(
        config_path.as_deref(),
        start.as_deref(),
        end.as_deref(),
        metric.as_deref(),
        output_dir.as_deref(),
    )?;
    let api_key = config.resolve_api_key()?;
    tracing::debug!(run_id = %config.run_id(), metric = %config.analysis.metric, "config loaded");

    let fetcher = build_fetcher(&config);
    let sources = build_sources(&config, fetcher, &api_key);

    let outcome = match run_analysis(
        &config,
        sources.metric.as_ref(),
        sources.price.as_ref(),
        &SystemClock,
    ) {
        Ok(outcome) => outcome,
        Err(e) if e.is_empty_result() => {
            println!("No results: {e}");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    print_summary(&outcome);

    let run_dir = save_artifacts(&outcome, &config.output.dir)?;
    println!("Artifacts saved to: {}", run_dir.display());

    Ok(())
}

fn verify_key_cmd(config_path: Option<&Path>) -> Result<()> {
    let config = match config_path {
        Some(path) => AnalysisConfig::from_file(path)?,
        // the date range is unused by the pre-flight check
        None => {
            let today = chrono::Utc::now().date_naive();
            AnalysisConfig::for_range(today, today, MetricKind::DailyTx)
        }
    };
    let api_key = config.resolve_api_key()?;

    verify_api_key(&config, build_fetcher(&config), &api_key)?;
    println!("Etherscan API key accepted.");
    Ok(())
}

fn format_coefficient(value: Option<f64>) -> String {
    value.map_or_else(|| "undefined".to_string(), |v| format!("{v:.4}"))
}

fn print_summary(outcome: &RunOutcome) {
    let report = &outcome.report;
    println!();
    println!("=== Correlation Result ===");
    println!("Metric:         {}", report.metric.label());
    println!(
        "Period:         {} to {}",
        report.start_date, report.end_date
    );
    println!(
        "Days:           {} metric, {} price, {} joined",
        report.metric_days, report.price_days, report.joined_rows
    );
    println!("Returns:        {}", report.return_rows);
    println!();
    println!("--- Pearson ---");
    println!(
        "Same day:       {} ({} pairs)",
        format_coefficient(report.correlation.same_day),
        report.correlation.same_day_pairs
    );
    println!(
        "Next day (t+1): {} ({} pairs)",
        format_coefficient(report.correlation.next_day_lagged),
        report.correlation.lagged_pairs
    );
    println!("Run ID:         {}", &report.run_id[..12.min(report.run_id.len())]);
}
