//! Market segment, data kind and frequency definitions.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::KlineVaultError;

/// Market segment of the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketSegment {
    /// Spot market.
    Spot,
    /// USD-margined perpetual and delivery futures.
    UmFutures,
    /// Coin-margined perpetual and delivery futures.
    CmFutures,
}

impl MarketSegment {
    /// Returns the path token used in remote keys (e.g. `futures/um`).
    #[must_use]
    pub const fn path_token(&self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::UmFutures => "futures/um",
            Self::CmFutures => "futures/cm",
        }
    }

    /// Returns the short identifier (`spot`, `um`, `cm`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::UmFutures => "um",
            Self::CmFutures => "cm",
        }
    }

    /// Returns true for either futures segment.
    #[must_use]
    pub const fn is_futures(&self) -> bool {
        matches!(self, Self::UmFutures | Self::CmFutures)
    }

    /// Returns all segments.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Spot, Self::UmFutures, Self::CmFutures]
    }
}

impl std::fmt::Display for MarketSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MarketSegment {
    type Err = KlineVaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spot" => Ok(Self::Spot),
            "um" | "futures/um" | "um_futures" | "usdm" => Ok(Self::UmFutures),
            "cm" | "futures/cm" | "cm_futures" | "coinm" => Ok(Self::CmFutures),
            _ => Err(KlineVaultError::InvalidSchema(format!(
                "unknown market segment '{s}', expected one of: spot, um, cm"
            ))),
        }
    }
}

/// Kind of payload published in the archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataKind {
    /// Trade candles.
    Klines,
    /// Mark price candles (futures only).
    MarkPriceKlines,
    /// Index price candles (futures only).
    IndexPriceKlines,
    /// Premium index candles (futures only).
    PremiumIndexKlines,
    /// Aggregated trades.
    AggTrades,
    /// Individual trades.
    Trades,
    /// Open interest and long/short ratio metrics (futures only).
    Metrics,
    /// Funding rate history (futures only).
    FundingRate,
    /// Order book depth snapshots (futures only).
    BookDepth,
}

impl DataKind {
    /// Returns the directory name used in remote keys.
    #[must_use]
    pub const fn path_token(&self) -> &'static str {
        match self {
            Self::Klines => "klines",
            Self::MarkPriceKlines => "markPriceKlines",
            Self::IndexPriceKlines => "indexPriceKlines",
            Self::PremiumIndexKlines => "premiumIndexKlines",
            Self::AggTrades => "aggTrades",
            Self::Trades => "trades",
            Self::Metrics => "metrics",
            Self::FundingRate => "fundingRate",
            Self::BookDepth => "bookDepth",
        }
    }

    /// Returns true if files of this kind are candle-shaped and keyed by interval.
    #[must_use]
    pub const fn is_kline(&self) -> bool {
        matches!(
            self,
            Self::Klines | Self::MarkPriceKlines | Self::IndexPriceKlines | Self::PremiumIndexKlines
        )
    }

    /// Returns true if this kind is only published for futures segments.
    #[must_use]
    pub const fn is_futures_only(&self) -> bool {
        matches!(
            self,
            Self::MarkPriceKlines
                | Self::IndexPriceKlines
                | Self::PremiumIndexKlines
                | Self::Metrics
                | Self::FundingRate
                | Self::BookDepth
        )
    }

    /// Returns all data kinds.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Klines,
            Self::MarkPriceKlines,
            Self::IndexPriceKlines,
            Self::PremiumIndexKlines,
            Self::AggTrades,
            Self::Trades,
            Self::Metrics,
            Self::FundingRate,
            Self::BookDepth,
        ]
    }
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path_token())
    }
}

impl FromStr for DataKind {
    type Err = KlineVaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.path_token().eq_ignore_ascii_case(s))
            .or(match s.to_lowercase().as_str() {
                "kline" => Some(Self::Klines),
                "agg_trades" | "aggtrade" => Some(Self::AggTrades),
                "trade" => Some(Self::Trades),
                "funding_rate" => Some(Self::FundingRate),
                "book_depth" => Some(Self::BookDepth),
                _ => None,
            })
            .ok_or_else(|| KlineVaultError::InvalidSchema(format!("unknown data kind '{s}'")))
    }
}

/// Publication frequency of the archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// One archive per calendar day.
    #[default]
    Daily,
    /// One archive per calendar month.
    Monthly,
}

impl Frequency {
    /// Returns the path token used in remote keys.
    #[must_use]
    pub const fn path_token(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Monthly => "monthly",
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path_token())
    }
}

impl FromStr for Frequency {
    type Err = KlineVaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" | "day" | "d" => Ok(Self::Daily),
            "monthly" | "month" | "m" => Ok(Self::Monthly),
            _ => Err(KlineVaultError::InvalidSchema(format!(
                "unknown frequency '{s}', expected daily or monthly"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_tokens() {
        assert_eq!(MarketSegment::Spot.path_token(), "spot");
        assert_eq!(MarketSegment::UmFutures.path_token(), "futures/um");
        assert_eq!(MarketSegment::CmFutures.path_token(), "futures/cm");
        assert!(MarketSegment::UmFutures.is_futures());
        assert!(!MarketSegment::Spot.is_futures());
    }

    #[test]
    fn test_segment_parse() {
        assert_eq!("um".parse::<MarketSegment>().unwrap(), MarketSegment::UmFutures);
        assert_eq!("SPOT".parse::<MarketSegment>().unwrap(), MarketSegment::Spot);
        assert!("options".parse::<MarketSegment>().is_err());
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("klines".parse::<DataKind>().unwrap(), DataKind::Klines);
        assert_eq!("markPriceKlines".parse::<DataKind>().unwrap(), DataKind::MarkPriceKlines);
        assert_eq!("aggtrades".parse::<DataKind>().unwrap(), DataKind::AggTrades);
        assert_eq!("kline".parse::<DataKind>().unwrap(), DataKind::Klines);
        assert!("candles".parse::<DataKind>().is_err());
    }

    #[test]
    fn test_kind_shape() {
        assert!(DataKind::Klines.is_kline());
        assert!(DataKind::PremiumIndexKlines.is_kline());
        assert!(!DataKind::Metrics.is_kline());
        assert!(DataKind::Metrics.is_futures_only());
        assert!(!DataKind::Trades.is_futures_only());
    }

    #[test]
    fn test_frequency_parse() {
        assert_eq!("daily".parse::<Frequency>().unwrap(), Frequency::Daily);
        assert_eq!("Monthly".parse::<Frequency>().unwrap(), Frequency::Monthly);
        assert!("weekly".parse::<Frequency>().is_err());
    }
}
