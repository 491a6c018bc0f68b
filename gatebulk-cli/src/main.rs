//! gatebulk CLI — bulk candlestick downloads from Gate.io USDT futures.
//!
//! Commands:
//! - `download` — fetch one symbol's candlesticks page by page, then merge
//! - `download-all` — full history for every listed contract, sequentially
//! - `symbols` — print the exchange's contract list
//! - `status` — report pages and the combined file on disk for a symbol
//! - `merge` — rebuild a symbol's `all.csv` from the pages already on disk

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use gatebulk_core::data::{
    list_futures_symbols, Downloader, GateioClient, Interval, MergeOutcome, Merger, PageStore,
    SeriesStatus, StdoutProgress,
};
use gatebulk_core::DownloaderConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "gatebulk",
    version,
    about = "gatebulk — Gate.io USDT futures candlestick downloader"
)]
struct Cli {
    /// Path to a TOML config file. Built-in defaults are used without one.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Destination directory; data lands in <DEST>/gateio_data.
    #[arg(long, global = true)]
    dest: Option<PathBuf>,

    /// Override the REST API base URL.
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Log at info level (RUST_LOG takes precedence).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download one symbol's candlesticks and merge them into all.csv.
    Download {
        /// Contract name, e.g. BTC_USDT.
        symbol: String,

        /// Candlestick interval: 1m, 5m, 15m, 30m, 1h, 4h, 8h, 1d, 7d, 30d.
        #[arg(long, default_value = "1m")]
        interval: Interval,

        /// Start (YYYY-MM-DD or RFC 3339). Defaults to the configured history start.
        #[arg(long)]
        start: Option<String>,

        /// End (YYYY-MM-DD or RFC 3339). Defaults to now.
        #[arg(long)]
        end: Option<String>,
    },
    /// Download full history for every listed contract, one after another.
    DownloadAll {
        #[arg(long, default_value = "1m")]
        interval: Interval,
    },
    /// List every USDT futures contract name.
    Symbols,
    /// Report what is on disk for a symbol. All intervals unless one is given.
    Status {
        symbol: String,

        #[arg(long)]
        interval: Option<Interval>,
    },
    /// Merge a symbol's pages into all.csv without downloading.
    Merge {
        symbol: String,

        #[arg(long, default_value = "1m")]
        interval: Interval,

        /// Rebuild even if all.csv is less than a day old.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Download {
            symbol,
            interval,
            start,
            end,
        } => run_download(&config, &symbol, interval, start, end),
        Commands::DownloadAll { interval } => run_download_all(&config, interval),
        Commands::Symbols => run_symbols(&config),
        Commands::Status { symbol, interval } => run_status(&config, &symbol, interval),
        Commands::Merge {
            symbol,
            interval,
            force,
        } => run_merge(&config, &symbol, interval, force),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<DownloaderConfig> {
    let mut config = match &cli.config {
        Some(path) => DownloaderConfig::from_file(path)?,
        None => DownloaderConfig::default(),
    };
    if let Some(dest) = &cli.dest {
        config.destination_dir = dest.clone();
    }
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    config.validate()?;
    tracing::info!(
        dest = %config.destination_dir.display(),
        base_url = %config.base_url,
        "loaded config"
    );
    Ok(config)
}

/// `YYYY-MM-DD` is read as UTC midnight; anything else must be RFC 3339.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("invalid date '{s}' (expected YYYY-MM-DD or RFC 3339)"))
}

fn run_download(
    config: &DownloaderConfig,
    symbol: &str,
    interval: Interval,
    start: Option<String>,
    end: Option<String>,
) -> Result<()> {
    let start = start.as_deref().map(parse_datetime).transpose()?;
    let end = end.as_deref().map(parse_datetime).transpose()?;
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            bail!("--start {s} is after --end {e}");
        }
    }

    let client = GateioClient::from_config(config)?;
    let progress = StdoutProgress;
    let mut downloader = Downloader::new(&client, config, &progress);

    let report = downloader.download(symbol, start, end, interval)?;

    println!(
        "{symbol} {interval}: {} written, {} already present, {} empty, {} failed",
        report.written,
        report.already_present,
        report.empty,
        report.failed.len()
    );

    if !report.all_succeeded() {
        for (window, err) in &report.failed {
            eprintln!("Error for window starting {}: {err}", window.start);
        }
        if let Err(err) = &report.merge {
            eprintln!("Error merging {symbol} {interval}: {err}");
        }
        std::process::exit(1);
    }

    Ok(())
}

fn run_download_all(config: &DownloaderConfig, interval: Interval) -> Result<()> {
    let client = GateioClient::from_config(config)?;
    let progress = StdoutProgress;
    let mut downloader = Downloader::new(&client, config, &progress);

    let summary = downloader.download_all(interval)?;

    if !summary.all_succeeded() {
        for (sym, err) in &summary.errors {
            eprintln!("Error for {sym}: {err}");
        }
        for report in summary.reports.iter().filter(|r| !r.all_succeeded()) {
            if !report.failed.is_empty() {
                eprintln!(
                    "Error for {}: {} window(s) failed",
                    report.symbol,
                    report.failed.len()
                );
            }
            if let Err(err) = &report.merge {
                eprintln!("Error merging {}: {err}", report.symbol);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}

fn run_symbols(config: &DownloaderConfig) -> Result<()> {
    let client = GateioClient::from_config(config)?;
    for symbol in list_futures_symbols(&client)? {
        println!("{symbol}");
    }
    Ok(())
}

fn run_status(config: &DownloaderConfig, symbol: &str, interval: Option<Interval>) -> Result<()> {
    let store = PageStore::new(&config.destination_dir);

    let intervals: Vec<Interval> = match interval {
        Some(interval) => vec![interval],
        None => Interval::ALL.to_vec(),
    };

    let mut rows: Vec<SeriesStatus> = Vec::new();
    for interval in intervals {
        let status = store.status(symbol, interval)?;
        if status.page_count > 0 || status.combined_rows.is_some() {
            rows.push(status);
        }
    }

    if rows.is_empty() {
        println!("No data for {symbol} under {}", store.root().display());
        return Ok(());
    }

    println!("Store: {}", store.root().display());
    println!("Symbol: {symbol}");
    println!();
    println!("{:<9} {:>7} {:>12} {:>10}", "Interval", "Pages", "Merged rows", "Age");
    println!("{}", "-".repeat(41));
    for status in &rows {
        let merged = status
            .combined_rows
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".into());
        let age = status
            .combined_age
            .map(format_age)
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<9} {:>7} {:>12} {:>10}",
            status.interval.as_str(),
            status.page_count,
            merged,
            age
        );
    }

    Ok(())
}

fn run_merge(config: &DownloaderConfig, symbol: &str, interval: Interval, force: bool) -> Result<()> {
    let store = PageStore::new(&config.destination_dir);
    let merger = Merger::new(&store, config.merge_max_age());

    let outcome = if force {
        merger.rebuild(symbol, interval)?
    } else {
        merger.merge(symbol, interval)?
    };

    match outcome {
        MergeOutcome::Merged { path, pages, rows } => {
            println!("Merged {pages} page(s), {rows} rows into {}", path.display())
        }
        MergeOutcome::Fresh { path } => println!(
            "{} is newer than {}; pass --force to rebuild",
            path.display(),
            format_age(config.merge_max_age())
        ),
        MergeOutcome::NoPages => {
            println!("No pages for {symbol}/{interval} in {}", store.root().display());
            std::process::exit(1);
        }
    }

    Ok(())
}

fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 60 * 60 {
        format!("{}m", secs / 60)
    } else if secs < 48 * 60 * 60 {
        format!("{:.1}h", secs as f64 / 3600.0)
    } else {
        format!("{}d", secs / 86_400)
    }
}
