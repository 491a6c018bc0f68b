//! Candlestick download: exchange client, window planning, page store and merge.

pub mod catalog;
pub mod download;
pub mod gateio;
pub mod interval;
pub mod merge;
pub mod provider;
pub mod retry;
pub mod store;
pub mod window;

pub use catalog::{list_futures_symbols, validate_symbol, SymbolCatalog};
pub use download::{BatchSummary, DownloadReport, Downloader, PageOutcome, SkipReason};
pub use gateio::{GateioClient, GATEIO_BASE_URL};
pub use interval::Interval;
pub use merge::{MergeOutcome, Merger};
pub use provider::{
    Candlestick, CandlestickRequest, Contract, DataError, DownloadProgress, ExchangeApi,
    NoProgress, StdoutProgress,
};
pub use retry::RetryPolicy;
pub use store::{PageStore, SeriesStatus};
pub use window::{plan_windows, Window, WindowPlan, MAX_PAGE_RECORDS};
