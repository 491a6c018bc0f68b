//! Gate.io futures REST client.
//!
//! Talks to the public v4 API: the USDT contract listing and the
//! candlesticks endpoint. One call performs exactly one request; failures are
//! classified so the driver can retry transport errors and give up on
//! application-level status codes.

use super::provider::{Candlestick, CandlestickRequest, Contract, DataError, ExchangeApi};
use crate::config::DownloaderConfig;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Production base URL of the Gate.io v4 API.
pub const GATEIO_BASE_URL: &str = "https://api.gateio.ws/api/v4";

const CONTRACTS_PATH: &str = "/futures/usdt/contracts";
const CANDLESTICKS_PATH: &str = "/futures/usdt/candlesticks";

/// Blocking Gate.io REST client.
#[derive(Debug, Clone)]
pub struct GateioClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl GateioClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("gatebulk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn from_config(config: &DownloaderConfig) -> Result<Self, DataError> {
        Self::new(config.base_url.clone(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    /// GET `path` with `query` and decode a JSON body.
    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, DataError> {
        let endpoint = self.endpoint(path);
        debug!(%endpoint, ?query, "GET");

        let resp = self
            .client
            .get(&endpoint)
            .query(query)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .send()
            .map_err(|e| DataError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::HttpStatus {
                status: status.as_u16(),
                endpoint,
            });
        }

        // A body cut off mid-transfer is a transport failure, not a format change.
        let body = resp
            .text()
            .map_err(|e| DataError::Transport(e.to_string()))?;

        serde_json::from_str(&body).map_err(|e| {
            DataError::ResponseFormat(format!("failed to parse response from {endpoint}: {e}"))
        })
    }
}

impl ExchangeApi for GateioClient {
    fn name(&self) -> &str {
        "gateio_futures_usdt"
    }

    fn list_contracts(&self) -> Result<Vec<Contract>, DataError> {
        self.get_json(CONTRACTS_PATH, &[])
    }

    fn candlesticks(&self, request: &CandlestickRequest) -> Result<Vec<Candlestick>, DataError> {
        let query = [
            ("contract", request.contract.clone()),
            ("from", request.from.to_string()),
            ("to", request.to.to_string()),
            ("interval", request.interval.to_string()),
        ];
        self.get_json(CANDLESTICKS_PATH, &query)
    }
}
