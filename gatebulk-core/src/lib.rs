//! gatebulk core — bulk download of Gate.io futures candlesticks.
//!
//! This crate contains the whole download pipeline:
//! - Symbol catalog fetch and validation
//! - Window planning sized to the exchange's 2000-record page cap
//! - Page fetch with fixed-delay retry on transport failures
//! - Page store on the local filesystem, used as the resumption ledger
//! - Merge of all pages into one time-sorted `all.csv` per symbol/interval

pub mod config;
pub mod data;

pub use config::{ConfigError, DownloaderConfig, RetryConfig};
