//! Merger — concatenates every page file of a series into `all.csv`.
//!
//! Rows are sorted ascending by the timestamp column with a stable sort, so
//! rows duplicated on shared window boundaries are kept, in page order. The
//! merge is skipped while the existing combined file is younger than the
//! freshness threshold.

use super::interval::Interval;
use super::provider::DataError;
use super::store::{parse_timestamp, write_csv_atomic, PageStore, TIMESTAMP_COLUMN};
use chrono::NaiveDateTime;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

/// Combined files younger than this are left alone.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// What the merge step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// `all.csv` was rebuilt from `pages` page files holding `rows` data rows.
    Merged {
        path: PathBuf,
        pages: usize,
        rows: usize,
    },
    /// An existing `all.csv` is within the freshness threshold.
    Fresh { path: PathBuf },
    /// No page files exist; nothing was written.
    NoPages,
}

/// Merges a series' page files into its combined file.
#[derive(Debug, Clone)]
pub struct Merger<'a> {
    store: &'a PageStore,
    max_age: Duration,
}

impl<'a> Merger<'a> {
    pub fn new(store: &'a PageStore, max_age: Duration) -> Self {
        Self { store, max_age }
    }

    /// Merge unless a fresh combined file already exists.
    pub fn merge(&self, symbol: &str, interval: Interval) -> Result<MergeOutcome, DataError> {
        let combined = self.store.combined_path(symbol, interval);
        if is_fresh(&combined, self.max_age, SystemTime::now())? {
            debug!(path = %combined.display(), "combined file is fresh");
            return Ok(MergeOutcome::Fresh { path: combined });
        }
        self.rebuild(symbol, interval)
    }

    /// Merge regardless of the combined file's age.
    pub fn rebuild(&self, symbol: &str, interval: Interval) -> Result<MergeOutcome, DataError> {
        let combined = self.store.combined_path(symbol, interval);
        if combined.exists() {
            fs::remove_file(&combined).map_err(|e| DataError::io(&combined, e))?;
        }

        let pages = self.store.page_files(symbol, interval)?;
        if pages.is_empty() {
            return Ok(MergeOutcome::NoPages);
        }

        let rows = merge_pages(&pages, &combined)?;
        info!(symbol, %interval, pages = pages.len(), rows, "merged pages");
        Ok(MergeOutcome::Merged {
            path: combined,
            pages: pages.len(),
            rows,
        })
    }
}

/// Whether `path` exists and was modified less than `max_age` before `now`.
///
/// A modification time in the future counts as fresh.
pub fn is_fresh(path: &Path, max_age: Duration, now: SystemTime) -> Result<bool, DataError> {
    if !path.is_file() {
        return Ok(false);
    }
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| DataError::io(path, e))?;
    Ok(match now.duration_since(modified) {
        Ok(age) => age < max_age,
        Err(_) => true,
    })
}

/// Concatenate `pages` and write them to `out` sorted by timestamp.
///
/// Every page must share the first page's header. Returns the number of data
/// rows written.
pub fn merge_pages(pages: &[PathBuf], out: &Path) -> Result<usize, DataError> {
    let mut header: Option<csv::StringRecord> = None;
    let mut time_col = 0;
    let mut rows: Vec<(NaiveDateTime, csv::StringRecord)> = Vec::new();

    for page in pages {
        let mut reader = csv::Reader::from_path(page).map_err(|e| DataError::csv(page, e))?;
        let page_header = reader.headers().map_err(|e| DataError::csv(page, e))?.clone();

        if let Some(expected) = &header {
            if *expected != page_header {
                return Err(DataError::csv(
                    page,
                    format!("header {page_header:?} does not match {expected:?}"),
                ));
            }
        } else {
            time_col = page_header
                .iter()
                .position(|h| h == TIMESTAMP_COLUMN)
                .ok_or_else(|| {
                    DataError::csv(page, format!("missing '{TIMESTAMP_COLUMN}' column"))
                })?;
            header = Some(page_header);
        }

        for record in reader.records() {
            let record = record.map_err(|e| DataError::csv(page, e))?;
            let cell = record
                .get(time_col)
                .ok_or_else(|| DataError::csv(page, "row is missing the timestamp cell"))?;
            rows.push((parse_timestamp(cell)?, record));
        }
    }

    rows.sort_by_key(|(t, _)| *t);

    write_csv_atomic(out, |writer| {
        if let Some(header) = &header {
            writer
                .write_record(header)
                .map_err(|e| DataError::csv(out, e))?;
        }
        for (_, record) in &rows {
            writer
                .write_record(record)
                .map_err(|e| DataError::csv(out, e))?;
        }
        Ok(())
    })?;

    Ok(rows.len())
}
