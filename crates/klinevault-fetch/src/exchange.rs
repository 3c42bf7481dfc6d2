//! Symbol metadata from the public `exchangeInfo` endpoints.

use async_trait::async_trait;
use klinevault_types::{KlineVaultError, MarketSegment, Result, Symbol};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::url::exchange_info_url;
use crate::{FetchError, HttpClient};

/// Trading metadata of one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    /// Exchange symbol.
    pub symbol: Symbol,
    /// Trading status (`TRADING`, `BREAK`, `SETTLING`, ...).
    #[serde(alias = "contractStatus", default)]
    pub status: String,
    /// Base asset.
    #[serde(default)]
    pub base_asset: String,
    /// Quote asset.
    #[serde(default)]
    pub quote_asset: String,
    /// Futures contract type (`PERPETUAL`, `CURRENT_QUARTER`, ...).
    #[serde(default)]
    pub contract_type: Option<String>,
    /// Listing time of a futures contract, in milliseconds.
    #[serde(default)]
    pub onboard_date: Option<i64>,
}

impl SymbolInfo {
    /// Returns true if the symbol is currently trading.
    #[must_use]
    pub fn is_trading(&self) -> bool {
        self.status == "TRADING"
    }

    /// Returns true for perpetual futures contracts.
    #[must_use]
    pub fn is_perpetual(&self) -> bool {
        self.contract_type.as_deref() == Some("PERPETUAL")
    }
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

/// Source of per-symbol trading metadata.
#[async_trait]
pub trait SymbolMetadataSource: Send + Sync {
    /// Returns metadata keyed by symbol.
    async fn exchange_info(&self) -> Result<BTreeMap<Symbol, SymbolInfo>>;
}

/// Client for the REST `exchangeInfo` endpoint of one segment.
#[derive(Debug, Clone)]
pub struct ExchangeInfoClient {
    client: HttpClient,
    segment: MarketSegment,
    url: String,
}

impl ExchangeInfoClient {
    /// Creates a client for the segment's public endpoint.
    #[must_use]
    pub fn new(client: HttpClient, segment: MarketSegment) -> Self {
        Self {
            client,
            segment,
            url: exchange_info_url(segment).to_string(),
        }
    }

    /// Overrides the endpoint URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Returns the segment this client queries.
    #[must_use]
    pub const fn segment(&self) -> MarketSegment {
        self.segment
    }
}

/// Decodes an `exchangeInfo` response body.
///
/// # Errors
///
/// Returns [`KlineVaultError::Json`] if the body is not an `exchangeInfo` document.
pub fn parse_exchange_info(body: &str) -> Result<BTreeMap<Symbol, SymbolInfo>> {
    let info: ExchangeInfo = serde_json::from_str(body)?;
    Ok(info
        .symbols
        .into_iter()
        .map(|s| (s.symbol.clone(), s))
        .collect())
}

#[async_trait]
impl SymbolMetadataSource for ExchangeInfoClient {
    async fn exchange_info(&self) -> Result<BTreeMap<Symbol, SymbolInfo>> {
        let body = self
            .client
            .get_text(&self.url)
            .await?
            .ok_or_else(|| FetchError::NotFound(self.url.clone()))?;
        let symbols = parse_exchange_info(&body).map_err(|e| {
            KlineVaultError::RemoteUnavailable(format!("unexpected exchangeInfo payload: {e}"))
        })?;
        info!(
            event_type = "exchange_info_fetched",
            segment = %self.segment,
            count = symbols.len(),
            "Fetched exchange info"
        );
        Ok(symbols)
    }
}
