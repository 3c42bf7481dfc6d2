//! Kline interval definitions.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::KlineVaultError;

/// Candle interval published for kline-shaped data kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KlineInterval {
    /// 1-second candles.
    #[serde(rename = "1s")]
    Second1,
    /// 1-minute candles.
    #[serde(rename = "1m")]
    Minute1,
    /// 3-minute candles.
    #[serde(rename = "3m")]
    Minute3,
    /// 5-minute candles.
    #[serde(rename = "5m")]
    Minute5,
    /// 15-minute candles.
    #[serde(rename = "15m")]
    Minute15,
    /// 30-minute candles.
    #[serde(rename = "30m")]
    Minute30,
    /// 1-hour candles.
    #[serde(rename = "1h")]
    Hour1,
    /// 2-hour candles.
    #[serde(rename = "2h")]
    Hour2,
    /// 4-hour candles.
    #[serde(rename = "4h")]
    Hour4,
    /// 6-hour candles.
    #[serde(rename = "6h")]
    Hour6,
    /// 8-hour candles.
    #[serde(rename = "8h")]
    Hour8,
    /// 12-hour candles.
    #[serde(rename = "12h")]
    Hour12,
    /// Daily candles.
    #[serde(rename = "1d")]
    Day1,
    /// 3-day candles.
    #[serde(rename = "3d")]
    Day3,
    /// Weekly candles.
    #[serde(rename = "1w")]
    Week1,
    /// Monthly candles.
    #[serde(rename = "1mo")]
    Month1,
}

impl KlineInterval {
    /// Returns the nominal duration in seconds.
    ///
    /// Monthly candles have no fixed length; 30 days is returned for them.
    #[must_use]
    pub const fn seconds(&self) -> u64 {
        match self {
            Self::Second1 => 1,
            Self::Minute1 => 60,
            Self::Minute3 => 180,
            Self::Minute5 => 300,
            Self::Minute15 => 900,
            Self::Minute30 => 1800,
            Self::Hour1 => 3600,
            Self::Hour2 => 7200,
            Self::Hour4 => 14_400,
            Self::Hour6 => 21_600,
            Self::Hour8 => 28_800,
            Self::Hour12 => 43_200,
            Self::Day1 => 86_400,
            Self::Day3 => 259_200,
            Self::Week1 => 604_800,
            Self::Month1 => 2_592_000,
        }
    }

    /// Returns the token used in remote keys and file names.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Second1 => "1s",
            Self::Minute1 => "1m",
            Self::Minute3 => "3m",
            Self::Minute5 => "5m",
            Self::Minute15 => "15m",
            Self::Minute30 => "30m",
            Self::Hour1 => "1h",
            Self::Hour2 => "2h",
            Self::Hour4 => "4h",
            Self::Hour6 => "6h",
            Self::Hour8 => "8h",
            Self::Hour12 => "12h",
            Self::Day1 => "1d",
            Self::Day3 => "3d",
            Self::Week1 => "1w",
            Self::Month1 => "1mo",
        }
    }

    /// Returns all available intervals, shortest first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Second1,
            Self::Minute1,
            Self::Minute3,
            Self::Minute5,
            Self::Minute15,
            Self::Minute30,
            Self::Hour1,
            Self::Hour2,
            Self::Hour4,
            Self::Hour6,
            Self::Hour8,
            Self::Hour12,
            Self::Day1,
            Self::Day3,
            Self::Week1,
            Self::Month1,
        ]
    }
}

impl std::fmt::Display for KlineInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for KlineInterval {
    type Err = KlineVaultError;

    // Tokens are case sensitive: `1m` is a minute and `1M` is the exchange's month.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "1M" {
            return Ok(Self::Month1);
        }
        Self::all()
            .iter()
            .copied()
            .find(|interval| interval.as_str() == s)
            .ok_or_else(|| {
                KlineVaultError::InvalidSchema(format!(
                    "unknown kline interval '{s}', expected one of: 1s, 1m, 3m, 5m, 15m, 30m, 1h, 2h, 4h, 6h, 8h, 12h, 1d, 3d, 1w, 1mo"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_parse() {
        assert_eq!("1m".parse::<KlineInterval>().unwrap(), KlineInterval::Minute1);
        assert_eq!("1mo".parse::<KlineInterval>().unwrap(), KlineInterval::Month1);
        assert_eq!("1M".parse::<KlineInterval>().unwrap(), KlineInterval::Month1);
        assert_eq!("12h".parse::<KlineInterval>().unwrap(), KlineInterval::Hour12);
        assert!("7m".parse::<KlineInterval>().is_err());
        assert!("".parse::<KlineInterval>().is_err());
    }

    #[test]
    fn test_interval_tokens_roundtrip() {
        for interval in KlineInterval::all() {
            assert_eq!(interval.as_str().parse::<KlineInterval>().unwrap(), *interval);
        }
    }

    #[test]
    fn test_interval_ordering() {
        let all = KlineInterval::all();
        assert!(all.windows(2).all(|w| w[0].seconds() < w[1].seconds()));
        assert_eq!(KlineInterval::Hour1.seconds(), 3600);
    }

    #[test]
    fn test_interval_serde() {
        let json = serde_json::to_string(&KlineInterval::Minute15).unwrap();
        assert_eq!(json, "\"15m\"");
    }
}
