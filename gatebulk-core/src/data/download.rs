//! Download driver — walks a symbol's time range window by window, then merges.
//!
//! The file tree is the only state: a window whose page file was written after
//! the window closed is not requested again, so rerunning a download resumes
//! where the last one stopped.

use super::catalog::SymbolCatalog;
use super::interval::Interval;
use super::merge::{MergeOutcome, Merger};
use super::provider::{CandlestickRequest, DataError, DownloadProgress, ExchangeApi};
use super::retry::{retry_fixed, RetryPolicy};
use super::store::PageStore;
use super::window::{Window, WindowPlan};
use crate::config::DownloaderConfig;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of handling one window.
#[derive(Debug)]
pub enum PageOutcome {
    /// A page file was written.
    Written { path: PathBuf, rows: usize },
    /// Nothing was written, and nothing went wrong.
    Skipped(SkipReason),
    /// The window was abandoned for this run.
    Failed(DataError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The page file was written after its window closed; no request was made.
    AlreadyPresent,
    /// The exchange returned no candlesticks for the window.
    EmptyPage,
}

/// Per symbol/interval summary of a download.
#[derive(Debug)]
pub struct DownloadReport {
    pub symbol: String,
    pub interval: Interval,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub written: usize,
    pub already_present: usize,
    pub empty: usize,
    pub failed: Vec<(Window, DataError)>,
    /// The merge step; a failed merge does not discard the window counts.
    pub merge: Result<MergeOutcome, DataError>,
}

impl DownloadReport {
    pub fn windows(&self) -> usize {
        self.written + self.already_present + self.empty + self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty() && self.merge.is_ok()
    }
}

/// Summary of a bulk download across the whole catalog.
#[derive(Debug)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub reports: Vec<DownloadReport>,
    pub errors: Vec<(String, DataError)>,
}

impl BatchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Sequential downloader bound to one exchange client and one page store.
///
/// The symbol catalog is fetched on first use and reused for every later
/// validation in the same run.
pub struct Downloader<'a> {
    api: &'a dyn ExchangeApi,
    progress: &'a dyn DownloadProgress,
    store: PageStore,
    retry: RetryPolicy,
    throttle: Duration,
    merge_max_age: Duration,
    page_limit: u32,
    history_start: DateTime<Utc>,
    catalog: Option<SymbolCatalog>,
}

impl<'a> Downloader<'a> {
    pub fn new(
        api: &'a dyn ExchangeApi,
        config: &DownloaderConfig,
        progress: &'a dyn DownloadProgress,
    ) -> Self {
        Self {
            api,
            progress,
            store: PageStore::new(&config.destination_dir),
            retry: config.retry_policy(),
            throttle: config.throttle(),
            merge_max_age: config.merge_max_age(),
            page_limit: config.page_limit,
            history_start: config.history_start_utc(),
            catalog: None,
        }
    }

    /// Use an already fetched catalog instead of querying the exchange.
    pub fn with_catalog(mut self, catalog: SymbolCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn store(&self) -> &PageStore {
        &self.store
    }

    /// The run's catalog snapshot, fetched on first call.
    pub fn catalog(&mut self) -> Result<&SymbolCatalog, DataError> {
        let catalog = match self.catalog.take() {
            Some(catalog) => catalog,
            None => SymbolCatalog::fetch(self.api)?,
        };
        Ok(self.catalog.insert(catalog))
    }

    /// Download `symbol` at `interval` over `[start, end]`, then merge.
    ///
    /// A missing start means the configured history start; a missing end
    /// means now, read once for the whole call. A page is skipped only if it
    /// was written after its window closed; otherwise it may be missing
    /// candles and is fetched again. Window and merge failures are collected
    /// in the report, not returned.
    pub fn download(
        &mut self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        interval: Interval,
    ) -> Result<DownloadReport, DataError> {
        self.catalog()?.validate(symbol)?;

        let start = start.unwrap_or(self.history_start);
        let end = end.unwrap_or_else(Utc::now);
        if start > end {
            return Err(DataError::InvalidRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }

        self.store.ensure_series_dir(symbol, interval)?;
        info!(symbol, %interval, %start, %end, "downloading");

        let mut written = 0;
        let mut already_present = 0;
        let mut empty = 0;
        let mut failed = Vec::new();

        for window in WindowPlan::with_page_limit(interval, start, end, self.page_limit) {
            let outcome = if self.store.has_complete_page(symbol, interval, &window) {
                PageOutcome::Skipped(SkipReason::AlreadyPresent)
            } else {
                let outcome = self.fetch_window(symbol, &window, interval);
                std::thread::sleep(self.throttle);
                outcome
            };

            self.progress.on_page(symbol, interval, &window, &outcome);
            match outcome {
                PageOutcome::Written { .. } => written += 1,
                PageOutcome::Skipped(SkipReason::AlreadyPresent) => already_present += 1,
                PageOutcome::Skipped(SkipReason::EmptyPage) => empty += 1,
                PageOutcome::Failed(e) => failed.push((window, e)),
            }
        }

        let merge = self.merge(symbol, interval, false);
        self.progress.on_merge(symbol, interval, &merge);

        Ok(DownloadReport {
            symbol: symbol.to_string(),
            interval,
            start,
            end,
            written,
            already_present,
            empty,
            failed,
            merge,
        })
    }

    /// Fetch one window and persist it. Never skips on an existing file.
    pub fn fetch_window(&self, symbol: &str, window: &Window, interval: Interval) -> PageOutcome {
        let request = CandlestickRequest::new(symbol, window, interval);

        let rows = match retry_fixed(&self.retry, |attempt| {
            debug!(symbol, from = request.from, to = request.to, attempt, "requesting page");
            self.api.candlesticks(&request)
        }) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(symbol, from = request.from, error = %e, "window failed");
                return PageOutcome::Failed(e);
            }
        };

        if rows.is_empty() {
            return PageOutcome::Skipped(SkipReason::EmptyPage);
        }

        match self
            .store
            .write_page(symbol, interval, window.start_ts(), &rows)
        {
            Ok(path) => PageOutcome::Written {
                path,
                rows: rows.len(),
            },
            Err(e) => PageOutcome::Failed(e),
        }
    }

    /// Merge a series' pages; `force` ignores the freshness threshold.
    pub fn merge(
        &self,
        symbol: &str,
        interval: Interval,
        force: bool,
    ) -> Result<MergeOutcome, DataError> {
        let merger = Merger::new(&self.store, self.merge_max_age);
        if force {
            merger.rebuild(symbol, interval)
        } else {
            merger.merge(symbol, interval)
        }
    }

    /// Download full history for every catalog symbol, one after another.
    ///
    /// A symbol that errors out is recorded and the batch moves on.
    pub fn download_all(&mut self, interval: Interval) -> Result<BatchSummary, DataError> {
        let symbols = self.catalog()?.symbols().to_vec();
        let total = symbols.len();
        let mut succeeded = 0;
        let mut failed = 0;
        let mut reports = Vec::new();
        let mut errors = Vec::new();

        for (i, symbol) in symbols.iter().enumerate() {
            self.progress.on_symbol_start(symbol, i, total);
            let result = self.download(symbol, None, None, interval);
            self.progress.on_symbol_complete(symbol, i, total, &result);

            match result {
                Ok(report) => {
                    if report.all_succeeded() {
                        succeeded += 1;
                    } else {
                        failed += 1;
                    }
                    reports.push(report);
                }
                Err(e) => {
                    errors.push((symbol.clone(), e));
                    failed += 1;
                }
            }
        }

        self.progress.on_batch_complete(succeeded, failed, total);

        Ok(BatchSummary {
            total,
            succeeded,
            failed,
            reports,
            errors,
        })
    }
}
