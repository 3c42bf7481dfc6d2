//! Parsed row types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Symbol;

/// Column names of a kline payload, in file order.
///
/// The twelfth source column ("ignore") is carried by the files but never
/// decoded.
pub const KLINE_COLUMNS: [&str; 12] = [
    "open_time",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "close_time",
    "quote_volume",
    "count",
    "taker_buy_volume",
    "taker_buy_quote_volume",
    "ignore",
];

/// Column names of a metrics payload, in file order.
pub const METRICS_COLUMNS: [&str; 8] = [
    "create_time",
    "symbol",
    "sum_open_interest",
    "sum_open_interest_value",
    "count_toptrader_long_short_ratio",
    "sum_toptrader_long_short_ratio",
    "count_long_short_ratio",
    "sum_taker_long_short_vol_ratio",
];

/// One candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KlineRow {
    /// Candle open time (UTC).
    pub open_time: DateTime<Utc>,
    /// Opening price.
    pub open: Decimal,
    /// Highest price.
    pub high: Decimal,
    /// Lowest price.
    pub low: Decimal,
    /// Closing price.
    pub close: Decimal,
    /// Base asset volume.
    pub volume: Decimal,
    /// Candle close time (UTC).
    pub close_time: DateTime<Utc>,
    /// Quote asset volume.
    pub quote_volume: Decimal,
    /// Number of trades.
    pub trade_count: u64,
    /// Base asset volume bought by takers.
    pub taker_buy_base_volume: Decimal,
    /// Quote asset volume bought by takers.
    pub taker_buy_quote_volume: Decimal,
}

impl KlineRow {
    /// Returns the price range (high - low).
    #[must_use]
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }

    /// Returns true if the candle closed above its open.
    #[must_use]
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Returns the volume-weighted average price, or None without volume.
    #[must_use]
    pub fn vwap(&self) -> Option<Decimal> {
        self.quote_volume.checked_div(self.volume)
    }
}

/// One open-interest / long-short ratio snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsRow {
    /// Snapshot time (UTC).
    pub create_time: DateTime<Utc>,
    /// Symbol as written in the payload.
    pub symbol: Symbol,
    /// Open interest in contracts.
    pub sum_open_interest: Decimal,
    /// Open interest in quote asset.
    pub sum_open_interest_value: Decimal,
    /// Top trader long/short ratio by accounts.
    pub count_toptrader_long_short_ratio: Option<Decimal>,
    /// Top trader long/short ratio by positions.
    pub sum_toptrader_long_short_ratio: Option<Decimal>,
    /// Global long/short account ratio.
    pub count_long_short_ratio: Option<Decimal>,
    /// Taker buy/sell volume ratio.
    pub sum_taker_long_short_vol_ratio: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn row(open: &str, close: &str) -> KlineRow {
        let t = Utc.timestamp_millis_opt(1_672_531_200_000).unwrap();
        KlineRow {
            open_time: t,
            open: Decimal::from_str(open).unwrap(),
            high: Decimal::from_str("16550.5").unwrap(),
            low: Decimal::from_str("16500.0").unwrap(),
            close: Decimal::from_str(close).unwrap(),
            volume: Decimal::from_str("2").unwrap(),
            close_time: t + chrono::TimeDelta::milliseconds(59_999),
            quote_volume: Decimal::from_str("33050").unwrap(),
            trade_count: 10,
            taker_buy_base_volume: Decimal::ONE,
            taker_buy_quote_volume: Decimal::from_str("16525").unwrap(),
        }
    }

    #[test]
    fn test_kline_helpers() {
        let bar = row("16510.0", "16540.0");
        assert!(bar.is_bullish());
        assert_eq!(bar.range(), Decimal::from_str("50.5").unwrap());
        assert_eq!(bar.vwap(), Some(Decimal::from_str("16525").unwrap()));
    }

    #[test]
    fn test_vwap_without_volume() {
        let mut bar = row("1", "1");
        bar.volume = Decimal::ZERO;
        assert_eq!(bar.vwap(), None);
    }
}
