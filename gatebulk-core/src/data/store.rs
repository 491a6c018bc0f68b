//! Page store — the on-disk layout that doubles as the resumption ledger.
//!
//! Layout: `{destination}/gateio_data/{SYMBOL}/{interval}/`
//! - `{window start unix seconds}.csv` — one page per request window
//! - `all.csv` — combined, time-sorted union of all pages
//!
//! A page file written after its window closed means the window is done; one
//! written earlier may be missing candles and is fetched again. Writes go to a `.tmp`
//! sibling and are renamed into place, so an interrupted run never leaves a
//! partial page under its final name.

use super::interval::Interval;
use super::provider::{Candlestick, DataError};
use super::window::Window;
use chrono::{DateTime, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Directory created under the destination for all downloaded data.
pub const DATA_DIR_NAME: &str = "gateio_data";

/// File name of the combined dataset for a symbol/interval.
pub const COMBINED_FILE_NAME: &str = "all.csv";

/// Column holding the candlestick open time.
pub const TIMESTAMP_COLUMN: &str = "t";

/// Rendering of the normalized timestamp column (UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Page file header, in the field order the exchange returns.
pub const PAGE_HEADER: [&str; 7] = ["t", "v", "c", "h", "l", "o", "sum"];

/// Render a unix timestamp in the page file's date-time format.
pub fn format_timestamp(ts: i64) -> Result<String, DataError> {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
        .ok_or_else(|| DataError::InvalidTimestamp(ts.to_string()))
}

/// Parse a normalized timestamp cell back into a date-time.
pub fn parse_timestamp(cell: &str) -> Result<NaiveDateTime, DataError> {
    NaiveDateTime::parse_from_str(cell, TIMESTAMP_FORMAT)
        .map_err(|e| DataError::InvalidTimestamp(format!("'{cell}': {e}")))
}

/// Write a CSV file atomically: build it at `{path}.tmp`, then rename.
pub(crate) fn write_csv_atomic<F>(path: &Path, build: F) -> Result<(), DataError>
where
    F: FnOnce(&mut csv::Writer<fs::File>) -> Result<(), DataError>,
{
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let result = (|| {
        let mut writer =
            csv::Writer::from_path(&tmp_path).map_err(|e| DataError::csv(&tmp_path, e))?;
        build(&mut writer)?;
        writer.flush().map_err(|e| DataError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, path).map_err(|e| DataError::io(path, e))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// Summary of what is on disk for one symbol/interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesStatus {
    pub symbol: String,
    pub interval: Interval,
    pub dir: PathBuf,
    pub page_count: usize,
    /// Data rows in `all.csv`, if it exists.
    pub combined_rows: Option<usize>,
    /// Age of `all.csv` by modification time, if it exists.
    pub combined_age: Option<Duration>,
}

/// The page store rooted at `{destination}/gateio_data`.
#[derive(Debug, Clone)]
pub struct PageStore {
    root: PathBuf,
}

impl PageStore {
    pub fn new(destination_dir: impl AsRef<Path>) -> Self {
        Self {
            root: destination_dir.as_ref().join(DATA_DIR_NAME),
        }
    }

    /// Root directory of the store (`.../gateio_data`).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for a symbol/interval: `{root}/{SYMBOL}/{interval}/`
    pub fn series_dir(&self, symbol: &str, interval: Interval) -> PathBuf {
        self.root.join(symbol).join(interval.as_str())
    }

    pub fn ensure_series_dir(&self, symbol: &str, interval: Interval) -> Result<PathBuf, DataError> {
        let dir = self.series_dir(symbol, interval);
        fs::create_dir_all(&dir).map_err(|e| DataError::io(&dir, e))?;
        Ok(dir)
    }

    /// Path of the page file for the window starting at `window_start`.
    pub fn page_path(&self, symbol: &str, interval: Interval, window_start: i64) -> PathBuf {
        self.series_dir(symbol, interval)
            .join(format!("{window_start}.csv"))
    }

    pub fn combined_path(&self, symbol: &str, interval: Interval) -> PathBuf {
        self.series_dir(symbol, interval).join(COMBINED_FILE_NAME)
    }

    pub fn has_page(&self, symbol: &str, interval: Interval, window_start: i64) -> bool {
        self.page_path(symbol, interval, window_start).is_file()
    }

    /// Whether the window's page exists and was written after the window closed.
    ///
    /// A page written while its window was still open may lack the candles
    /// that arrived later, so it does not count as complete.
    pub fn has_complete_page(&self, symbol: &str, interval: Interval, window: &Window) -> bool {
        let path = self.page_path(symbol, interval, window.start_ts());
        fs::metadata(path)
            .ok()
            .filter(|m| m.is_file())
            .and_then(|m| m.modified().ok())
            .is_some_and(|modified| modified >= SystemTime::from(window.end))
    }

    /// Persist one page. Timestamps are normalized; other fields are written verbatim.
    pub fn write_page(
        &self,
        symbol: &str,
        interval: Interval,
        window_start: i64,
        rows: &[Candlestick],
    ) -> Result<PathBuf, DataError> {
        self.ensure_series_dir(symbol, interval)?;
        let path = self.page_path(symbol, interval, window_start);

        write_csv_atomic(&path, |writer| {
            writer
                .write_record(PAGE_HEADER)
                .map_err(|e| DataError::csv(&path, e))?;
            for row in rows {
                let t = format_timestamp(row.t)?;
                writer
                    .write_record([
                        t.as_str(),
                        row.v.as_str(),
                        row.c.as_str(),
                        row.h.as_str(),
                        row.l.as_str(),
                        row.o.as_str(),
                        row.sum.as_deref().unwrap_or(""),
                    ])
                    .map_err(|e| DataError::csv(&path, e))?;
            }
            Ok(())
        })?;

        Ok(path)
    }

    /// All page files for a symbol/interval, ordered by window start.
    ///
    /// `all.csv`, temp files and anything not named `{integer}.csv` are excluded.
    pub fn page_files(&self, symbol: &str, interval: Interval) -> Result<Vec<PathBuf>, DataError> {
        let dir = self.series_dir(symbol, interval);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir).map_err(|e| DataError::io(&dir, e))?;
        let mut pages: Vec<(i64, PathBuf)> = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| DataError::io(&dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let start = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<i64>().ok());
            if let Some(start) = start {
                pages.push((start, path));
            }
        }

        pages.sort_by_key(|(start, _)| *start);
        Ok(pages.into_iter().map(|(_, path)| path).collect())
    }

    /// Inspect the ledger for a symbol/interval without touching the network.
    pub fn status(&self, symbol: &str, interval: Interval) -> Result<SeriesStatus, DataError> {
        let page_count = self.page_files(symbol, interval)?.len();
        let combined = self.combined_path(symbol, interval);

        let (combined_rows, combined_age) = if combined.is_file() {
            let mut reader =
                csv::Reader::from_path(&combined).map_err(|e| DataError::csv(&combined, e))?;
            let mut rows = 0;
            for record in reader.records() {
                record.map_err(|e| DataError::csv(&combined, e))?;
                rows += 1;
            }
            let modified = fs::metadata(&combined)
                .and_then(|m| m.modified())
                .map_err(|e| DataError::io(&combined, e))?;
            let age = SystemTime::now()
                .duration_since(modified)
                .unwrap_or(Duration::ZERO);
            (Some(rows), Some(age))
        } else {
            (None, None)
        };

        Ok(SeriesStatus {
            symbol: symbol.to_string(),
            interval,
            dir: self.series_dir(symbol, interval),
            page_count,
            combined_rows,
            combined_age,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(t: i64) -> Candlestick {
        Candlestick {
            t,
            v: "10".into(),
            c: "1.5".into(),
            h: "2".into(),
            l: "1".into(),
            o: "1.2".into(),
            sum: Some("15".into()),
        }
    }

    #[test]
    fn layout_matches_destination_convention() {
        let store = PageStore::new("/data");
        assert_eq!(
            store.page_path("BTC_USDT", Interval::M1, 1577836800),
            PathBuf::from("/data/gateio_data/BTC_USDT/1m/1577836800.csv")
        );
        assert_eq!(
            store.combined_path("BTC_USDT", Interval::D1),
            PathBuf::from("/data/gateio_data/BTC_USDT/1d/all.csv")
        );
    }

    #[test]
    fn timestamp_normalization() {
        assert_eq!(format_timestamp(0).unwrap(), "1970-01-01 00:00:00");
        assert_eq!(format_timestamp(1577836860).unwrap(), "2020-01-01 00:01:00");
        let parsed = parse_timestamp("2020-01-01 00:01:00").unwrap();
        assert_eq!(parsed.and_utc().timestamp(), 1577836860);
        assert!(parse_timestamp("1577836860").is_err());
    }

    #[test]
    fn write_page_has_header_and_normalized_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = PageStore::new(dir.path());

        let path = store
            .write_page("BTC_USDT", Interval::M1, 0, &[candle(0), candle(60)])
            .unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines[0], "t,v,c,h,l,o,sum");
        assert_eq!(lines[1], "1970-01-01 00:00:00,10,1.5,2,1,1.2,15");
        assert_eq!(lines.len(), 3);
        assert!(store.has_page("BTC_USDT", Interval::M1, 0));
        assert!(!path.with_extension("csv.tmp").exists());
    }

    #[test]
    fn page_files_skip_combined_and_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = PageStore::new(dir.path());
        store.write_page("ETH_USDT", Interval::H1, 7200, &[candle(7200)]).unwrap();
        store.write_page("ETH_USDT", Interval::H1, 0, &[candle(0)]).unwrap();

        let series = store.series_dir("ETH_USDT", Interval::H1);
        fs::write(series.join("all.csv"), "t\n").unwrap();
        fs::write(series.join("3600.csv.tmp"), "partial").unwrap();
        fs::write(series.join("notes.txt"), "x").unwrap();

        let pages = store.page_files("ETH_USDT", Interval::H1).unwrap();
        assert_eq!(pages, vec![series.join("0.csv"), series.join("7200.csv")]);
        assert!(!store.has_page("ETH_USDT", Interval::H1, 3600));
    }

    #[test]
    fn missing_series_has_no_pages() {
        let dir = tempfile::tempdir().unwrap();
        let store = PageStore::new(dir.path());
        assert!(store.page_files("NOPE_USDT", Interval::M5).unwrap().is_empty());
    }

    #[test]
    fn status_without_combined_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = PageStore::new(dir.path());
        store.write_page("BTC_USDT", Interval::D1, 0, &[candle(0)]).unwrap();

        let status = store.status("BTC_USDT", Interval::D1).unwrap();
        assert_eq!(status.page_count, 1);
        assert_eq!(status.combined_rows, None);
        assert_eq!(status.combined_age, None);
    }

    #[test]
    fn page_written_before_window_closed_is_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let store = PageStore::new(dir.path());
        let start = DateTime::from_timestamp(1_704_067_200, 0).unwrap();
        let window = Window {
            start,
            end: start + chrono::TimeDelta::minutes(2000),
        };
        assert!(!store.has_complete_page("BTC_USDT", Interval::M1, &window));

        let path = store
            .write_page("BTC_USDT", Interval::M1, window.start_ts(), &[candle(window.start_ts())])
            .unwrap();
        // Written now, long after the 2024 window closed.
        assert!(store.has_complete_page("BTC_USDT", Interval::M1, &window));

        let file = fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::from(window.end - chrono::TimeDelta::minutes(1)))
            .unwrap();
        assert!(store.has_page("BTC_USDT", Interval::M1, window.start_ts()));
        assert!(!store.has_complete_page("BTC_USDT", Interval::M1, &window));
    }
}
