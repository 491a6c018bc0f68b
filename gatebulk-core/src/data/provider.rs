//! Exchange API trait, raw record types and structured error types.
//!
//! The ExchangeApi trait abstracts over the Gate.io REST client so the
//! pagination driver can be exercised against an in-process mock.

use super::download::{DownloadReport, PageOutcome, SkipReason};
use super::interval::Interval;
use super::merge::MergeOutcome;
use super::window::Window;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Raw futures candlestick as returned by `/futures/usdt/candlesticks`.
///
/// Prices and volumes are kept as the exchange's decimal text so page files
/// carry them verbatim. Numeric JSON values are accepted and rendered as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candlestick {
    /// Bucket open time, unix seconds. Integral floats and numeric text are accepted.
    #[serde(deserialize_with = "unix_seconds")]
    pub t: i64,
    #[serde(deserialize_with = "text_or_number")]
    pub v: String,
    #[serde(deserialize_with = "text_or_number")]
    pub c: String,
    #[serde(deserialize_with = "text_or_number")]
    pub h: String,
    #[serde(deserialize_with = "text_or_number")]
    pub l: String,
    #[serde(deserialize_with = "text_or_number")]
    pub o: String,
    #[serde(default, deserialize_with = "opt_text_or_number")]
    pub sum: Option<String>,
}

/// A futures contract record from `/futures/usdt/contracts`.
///
/// Only the name is used; every other field of the record is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub name: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Number(serde_json::Number),
}

impl From<TextOrNumber> for String {
    fn from(value: TextOrNumber) -> Self {
        match value {
            TextOrNumber::Text(s) => s,
            TextOrNumber::Number(n) => n.to_string(),
        }
    }
}

fn text_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    TextOrNumber::deserialize(deserializer).map(String::from)
}

fn unix_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let number = match TextOrNumber::deserialize(deserializer)? {
        TextOrNumber::Number(n) => n,
        TextOrNumber::Text(s) => s
            .trim()
            .parse::<serde_json::Number>()
            .map_err(|e| D::Error::custom(format!("timestamp '{s}': {e}")))?,
    };
    if let Some(ts) = number.as_i64() {
        return Ok(ts);
    }
    match number.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => Ok(f as i64),
        _ => Err(D::Error::custom(format!("timestamp {number} is not whole seconds"))),
    }
}

fn opt_text_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Option::<TextOrNumber>::deserialize(deserializer).map(|v| v.map(String::from))
}

/// Structured error types for download operations.
///
/// These are designed to be displayable in CLI output.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("invalid symbol: {symbol}")]
    InvalidSymbol { symbol: String },

    #[error("invalid interval '{0}' (expected one of 1m, 5m, 15m, 30m, 1h, 4h, 8h, 1d, 7d, 30d)")]
    InvalidInterval(String),

    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: String, end: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to download after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("HTTP {status} from {endpoint}")]
    HttpStatus { status: u16, endpoint: String },

    #[error("response format changed: {0}")]
    ResponseFormat(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {}: {message}", path.display())]
    Csv { path: PathBuf, message: String },
}

impl DataError {
    /// Whether this failure happened below the HTTP application layer.
    ///
    /// Only these are retried; a non-success status is final for the window.
    pub fn is_transport(&self) -> bool {
        matches!(self, DataError::Transport(_))
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DataError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        DataError::Csv {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Parameters of a single candlestick page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandlestickRequest {
    pub contract: String,
    /// Window start, unix seconds.
    pub from: i64,
    /// Window end, unix seconds.
    pub to: i64,
    pub interval: Interval,
}

impl CandlestickRequest {
    pub fn new(contract: &str, window: &Window, interval: Interval) -> Self {
        Self {
            contract: contract.to_string(),
            from: window.start_ts(),
            to: window.end_ts(),
            interval,
        }
    }
}

/// Trait for the exchange REST surface the downloader depends on.
///
/// Implementations perform exactly one request per call. Retry and
/// throttling live in the driver, not here.
pub trait ExchangeApi: Send + Sync {
    /// Human-readable name of this exchange client.
    fn name(&self) -> &str;

    /// List every USDT-settled futures contract.
    fn list_contracts(&self) -> Result<Vec<Contract>, DataError>;

    /// Fetch one page of candlesticks. An empty vector is a valid answer.
    fn candlesticks(&self, request: &CandlestickRequest) -> Result<Vec<Candlestick>, DataError>;
}

/// Progress callback for download operations.
pub trait DownloadProgress: Send {
    /// Called when the bulk driver starts a symbol.
    fn on_symbol_start(&self, symbol: &str, index: usize, total: usize);

    /// Called once per planned window, whether fetched, skipped or failed.
    fn on_page(&self, symbol: &str, interval: Interval, window: &Window, outcome: &PageOutcome);

    /// Called after the merge step for a symbol/interval.
    fn on_merge(
        &self,
        symbol: &str,
        interval: Interval,
        outcome: &Result<MergeOutcome, DataError>,
    );

    /// Called when the bulk driver finishes a symbol.
    fn on_symbol_complete(
        &self,
        symbol: &str,
        index: usize,
        total: usize,
        result: &Result<DownloadReport, DataError>,
    );

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress;

impl DownloadProgress for StdoutProgress {
    fn on_symbol_start(&self, symbol: &str, index: usize, total: usize) {
        println!("[{}/{}] Downloading {symbol}...", index + 1, total);
    }

    fn on_page(&self, symbol: &str, interval: Interval, window: &Window, outcome: &PageOutcome) {
        let start = window.start_ts();
        match outcome {
            PageOutcome::Written { path, rows } => {
                println!("  OK: {} ({rows} rows)", path.display())
            }
            PageOutcome::Skipped(SkipReason::AlreadyPresent) => {
                println!("  SKIP: {symbol}/{interval}/{start}.csv already downloaded")
            }
            PageOutcome::Skipped(SkipReason::EmptyPage) => {
                println!("  SKIP: {symbol}/{interval} {start}: no candlesticks")
            }
            PageOutcome::Failed(e) => println!("  FAIL: {symbol}/{interval} {start}: {e}"),
        }
    }

    fn on_merge(
        &self,
        symbol: &str,
        interval: Interval,
        outcome: &Result<MergeOutcome, DataError>,
    ) {
        match outcome {
            Ok(MergeOutcome::Merged { path, pages, rows }) => {
                println!("  MERGED: {} ({pages} pages, {rows} rows)", path.display())
            }
            Ok(MergeOutcome::Fresh { path }) => {
                println!("  SKIP: {} is less than a day old", path.display())
            }
            Ok(MergeOutcome::NoPages) => {
                println!("  SKIP: {symbol}/{interval} has no pages to merge")
            }
            Err(e) => println!("  FAIL: merge {symbol}/{interval}: {e}"),
        }
    }

    fn on_symbol_complete(
        &self,
        symbol: &str,
        _index: usize,
        _total: usize,
        result: &Result<DownloadReport, DataError>,
    ) {
        match result {
            Ok(report) if report.all_succeeded() => println!("  DONE: {symbol}"),
            Ok(report) if report.merge.is_err() => println!(
                "  DONE: {symbol} with {} failed window(s) and a failed merge",
                report.failed.len()
            ),
            Ok(report) => println!(
                "  DONE: {symbol} with {} failed window(s)",
                report.failed.len()
            ),
            Err(e) => println!("  FAIL: {symbol}: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        println!("\nDownload complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}

/// Progress reporter that discards every event.
pub struct NoProgress;

impl DownloadProgress for NoProgress {
    fn on_symbol_start(&self, _: &str, _: usize, _: usize) {}
    fn on_page(&self, _: &str, _: Interval, _: &Window, _: &PageOutcome) {}
    fn on_merge(&self, _: &str, _: Interval, _: &Result<MergeOutcome, DataError>) {}
    fn on_symbol_complete(&self, _: &str, _: usize, _: usize, _: &Result<DownloadReport, DataError>) {}
    fn on_batch_complete(&self, _: usize, _: usize, _: usize) {}
}
