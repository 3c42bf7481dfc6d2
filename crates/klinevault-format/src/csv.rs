//! CSV output format.

use chrono::{DateTime, SecondsFormat, Utc};
use klinevault_types::{KlineRow, MetricsRow};
use rust_decimal::Decimal;
use std::io::Write;

use crate::{FormatError, Formatter};

/// CSV formatter.
#[derive(Debug, Clone, Default)]
pub struct CsvFormatter {
    /// Field delimiter (default: comma).
    delimiter: char,
    /// Whether to include header row.
    include_header: bool,
}

impl CsvFormatter {
    /// Creates a new CSV formatter with default settings.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            delimiter: ',',
            include_header: true,
        }
    }

    /// Sets the field delimiter.
    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Sets whether to include a header row.
    #[must_use]
    pub const fn with_header(mut self, include: bool) -> Self {
        self.include_header = include;
        self
    }

    /// Creates a tab-separated values (TSV) formatter.
    #[must_use]
    pub const fn tsv() -> Self {
        Self {
            delimiter: '\t',
            include_header: true,
        }
    }
}

fn time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn optional(value: Option<Decimal>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl Formatter for CsvFormatter {
    fn write_klines<W: Write + Send>(
        &self,
        rows: &[KlineRow],
        mut writer: W,
    ) -> Result<(), FormatError> {
        let d = self.delimiter;

        if self.include_header {
            writeln!(
                writer,
                "open_time{d}open{d}high{d}low{d}close{d}volume{d}close_time{d}quote_volume{d}trade_count{d}taker_buy_base_volume{d}taker_buy_quote_volume"
            )?;
        }

        for row in rows {
            writeln!(
                writer,
                "{}{d}{}{d}{}{d}{}{d}{}{d}{}{d}{}{d}{}{d}{}{d}{}{d}{}",
                time(row.open_time),
                row.open,
                row.high,
                row.low,
                row.close,
                row.volume,
                time(row.close_time),
                row.quote_volume,
                row.trade_count,
                row.taker_buy_base_volume,
                row.taker_buy_quote_volume
            )?;
        }

        writer.flush()?;
        Ok(())
    }

    fn write_metrics<W: Write + Send>(
        &self,
        rows: &[MetricsRow],
        mut writer: W,
    ) -> Result<(), FormatError> {
        let d = self.delimiter;

        if self.include_header {
            writeln!(
                writer,
                "create_time{d}symbol{d}sum_open_interest{d}sum_open_interest_value{d}count_toptrader_long_short_ratio{d}sum_toptrader_long_short_ratio{d}count_long_short_ratio{d}sum_taker_long_short_vol_ratio"
            )?;
        }

        for row in rows {
            writeln!(
                writer,
                "{}{d}{}{d}{}{d}{}{d}{}{d}{}{d}{}{d}{}",
                time(row.create_time),
                row.symbol,
                row.sum_open_interest,
                row.sum_open_interest_value,
                optional(row.count_toptrader_long_short_ratio),
                optional(row.sum_toptrader_long_short_ratio),
                optional(row.count_long_short_ratio),
                optional(row.sum_taker_long_short_vol_ratio)
            )?;
        }

        writer.flush()?;
        Ok(())
    }

    fn extension(&self) -> &str {
        "csv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_rows::{kline, metrics};
    use std::io::Cursor;

    #[test]
    fn test_csv_klines() {
        let formatter = CsvFormatter::new();
        let mut output = Cursor::new(Vec::new());

        formatter.write_klines(&[kline(0)], &mut output).unwrap();

        let result = String::from_utf8(output.into_inner()).unwrap();
        let lines: Vec<_> = result.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("open_time,open,high"));
        assert!(lines[1].starts_with("2023-01-01T00:00:00Z,16541.77000000,"));
        assert!(lines[1].contains("2023-01-01T00:00:59.999Z"));
    }

    #[test]
    fn test_csv_no_header() {
        let formatter = CsvFormatter::new().with_header(false);
        let mut output = Cursor::new(Vec::new());

        formatter.write_klines(&[kline(0)], &mut output).unwrap();

        let result = String::from_utf8(output.into_inner()).unwrap();
        assert!(!result.contains("open_time"));
    }

    #[test]
    fn test_tsv_metrics() {
        let formatter = CsvFormatter::tsv();
        let mut output = Cursor::new(Vec::new());

        formatter.write_metrics(&[metrics()], &mut output).unwrap();

        let result = String::from_utf8(output.into_inner()).unwrap();
        assert!(result.contains("create_time\tsymbol\t"));
        assert!(result.contains("\tBTCUSDT\t95284.385\t"));
        assert!(result.trim_end().ends_with("\t\t0.98"));
    }
}
