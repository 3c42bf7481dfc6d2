//! Binance Vision and Binance REST URL construction.

use klinevault_types::{KlineVaultError, MarketSegment, Result};
use reqwest::Url;

/// Builds the download URL of an object key.
///
/// # Example
///
/// ```
/// use klinevault_fetch::url::object_url;
///
/// let url = object_url(
///     "https://data.binance.vision/",
///     "data/spot/daily/klines/BTCUSDT/1m/BTCUSDT-1m-2023-01-01.zip",
/// );
/// assert_eq!(
///     url,
///     "https://data.binance.vision/data/spot/daily/klines/BTCUSDT/1m/BTCUSDT-1m-2023-01-01.zip"
/// );
/// ```
#[must_use]
pub fn object_url(base_url: &str, key: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}

/// Builds one page request of a delimited bucket listing.
///
/// `marker` resumes a truncated listing after the given key or prefix.
///
/// # Errors
///
/// Returns [`KlineVaultError::Config`] if `listing_url` is not a valid URL.
pub fn listing_page_url(listing_url: &str, prefix: &str, marker: Option<&str>) -> Result<String> {
    let mut url = Url::parse(listing_url)
        .map_err(|e| KlineVaultError::Config(format!("invalid listing URL '{listing_url}': {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("delimiter", "/");
        query.append_pair("prefix", prefix);
        if let Some(marker) = marker {
            query.append_pair("marker", marker);
        }
    }
    Ok(url.into())
}

/// Returns the public `exchangeInfo` endpoint of a market segment.
#[must_use]
pub const fn exchange_info_url(segment: MarketSegment) -> &'static str {
    match segment {
        MarketSegment::Spot => "https://api.binance.com/api/v3/exchangeInfo",
        MarketSegment::UmFutures => "https://fapi.binance.com/fapi/v1/exchangeInfo",
        MarketSegment::CmFutures => "https://dapi.binance.com/dapi/v1/exchangeInfo",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url_joins_once() {
        assert_eq!(
            object_url("https://data.binance.vision", "/data/a.zip"),
            "https://data.binance.vision/data/a.zip"
        );
    }

    #[test]
    fn test_listing_page_url() {
        let url = listing_page_url(
            "https://s3-ap-northeast-1.amazonaws.com/data.binance.vision",
            "data/spot/daily/klines/",
            None,
        )
        .unwrap();
        assert_eq!(
            url,
            "https://s3-ap-northeast-1.amazonaws.com/data.binance.vision?delimiter=%2F&prefix=data%2Fspot%2Fdaily%2Fklines%2F"
        );

        let next = listing_page_url(
            "https://s3-ap-northeast-1.amazonaws.com/data.binance.vision",
            "data/spot/daily/klines/",
            Some("data/spot/daily/klines/BTCUSDT/"),
        )
        .unwrap();
        assert!(next.ends_with("&marker=data%2Fspot%2Fdaily%2Fklines%2FBTCUSDT%2F"));
    }

    #[test]
    fn test_listing_page_url_rejects_garbage() {
        assert!(listing_page_url("not a url", "data/", None).is_err());
    }

    #[test]
    fn test_exchange_info_urls() {
        assert!(exchange_info_url(MarketSegment::UmFutures).contains("fapi"));
        assert!(exchange_info_url(MarketSegment::CmFutures).contains("dapi"));
    }
}
