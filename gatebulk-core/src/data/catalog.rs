//! Symbol catalog — the exchange's list of tradable futures contracts.

use super::provider::{DataError, ExchangeApi};
use std::collections::HashSet;
use tracing::info;

/// Query the exchange for every USDT futures contract name, in exchange order.
pub fn list_futures_symbols(api: &dyn ExchangeApi) -> Result<Vec<String>, DataError> {
    let contracts = api.list_contracts()?;
    Ok(contracts.into_iter().map(|c| c.name).collect())
}

/// Validate `symbol` against a freshly fetched catalog.
///
/// Every call refetches the contract list; use [`SymbolCatalog`] to validate
/// many symbols against one snapshot.
pub fn validate_symbol(api: &dyn ExchangeApi, symbol: &str) -> Result<String, DataError> {
    SymbolCatalog::fetch(api)?.validate(symbol)?;
    Ok(symbol.to_string())
}

/// Snapshot of the contract list taken once per run.
#[derive(Debug, Clone, Default)]
pub struct SymbolCatalog {
    symbols: Vec<String>,
    index: HashSet<String>,
}

impl SymbolCatalog {
    pub fn fetch(api: &dyn ExchangeApi) -> Result<Self, DataError> {
        let catalog = Self::from_symbols(list_futures_symbols(api)?);
        info!(exchange = api.name(), contracts = catalog.len(), "fetched symbol catalog");
        Ok(catalog)
    }

    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let symbols: Vec<String> = symbols.into_iter().map(Into::into).collect();
        let index = symbols.iter().cloned().collect();
        Self { symbols, index }
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.index.contains(symbol)
    }

    pub fn validate(&self, symbol: &str) -> Result<(), DataError> {
        if self.contains(symbol) {
            Ok(())
        } else {
            Err(DataError::InvalidSymbol {
                symbol: symbol.to_string(),
            })
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
