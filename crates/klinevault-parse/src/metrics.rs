//! Futures metrics payload decoding.

use klinevault_types::{METRICS_COLUMNS, MetricsRow, Result, Symbol};
use std::io::Read;

use crate::parser::{
    ArchiveParser, ParsedTable, decimal, expect_columns, optional_decimal, read_records, time,
};
use crate::timestamp::parse_datetime;

/// Parser for `metrics` payloads (open interest and long/short ratios).
///
/// Ratio columns may be empty for early snapshots and decode to `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsParser;

impl ArchiveParser for MetricsParser {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn parse_reader(&self, reader: &mut dyn Read) -> Result<ParsedTable> {
        let mut rows = Vec::new();

        for (row, record) in read_records(reader, &METRICS_COLUMNS) {
            let record = record?;
            expect_columns(&record, row, METRICS_COLUMNS.len())?;
            if row == 0 && parse_datetime(&record[0]).is_none() {
                continue;
            }

            rows.push(MetricsRow {
                create_time: time(&record, row, 0, METRICS_COLUMNS[0], parse_datetime)?,
                symbol: Symbol::new(&record[1]),
                sum_open_interest: decimal(&record, row, 2, METRICS_COLUMNS[2])?,
                sum_open_interest_value: decimal(&record, row, 3, METRICS_COLUMNS[3])?,
                count_toptrader_long_short_ratio: optional_decimal(
                    &record,
                    row,
                    4,
                    METRICS_COLUMNS[4],
                )?,
                sum_toptrader_long_short_ratio: optional_decimal(
                    &record,
                    row,
                    5,
                    METRICS_COLUMNS[5],
                )?,
                count_long_short_ratio: optional_decimal(&record, row, 6, METRICS_COLUMNS[6])?,
                sum_taker_long_short_vol_ratio: optional_decimal(
                    &record,
                    row,
                    7,
                    METRICS_COLUMNS[7],
                )?,
            });
        }

        Ok(ParsedTable::Metrics(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use klinevault_types::KlineVaultError;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    const PAYLOAD: &str = "\
create_time,symbol,sum_open_interest,sum_open_interest_value,count_toptrader_long_short_ratio,sum_toptrader_long_short_ratio,count_long_short_ratio,sum_taker_long_short_vol_ratio
2023-01-01 00:05:00,BTCUSDT,95284.385,1575474806.18,1.23,1.45,1.67,0.98
2023-01-01 00:10:00,BTCUSDT,95291.002,1575901002.55,,,,
";

    #[test]
    fn test_parse_metrics() {
        let table = MetricsParser.parse_payload(PAYLOAD.as_bytes()).unwrap();
        let rows = table.as_metrics().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, Symbol::from("BTCUSDT"));
        assert_eq!(
            rows[0].sum_open_interest,
            Decimal::from_str("95284.385").unwrap()
        );
        assert_eq!(
            rows[0].sum_taker_long_short_vol_ratio,
            Some(Decimal::from_str("0.98").unwrap())
        );
        assert_eq!(rows[1].count_toptrader_long_short_ratio, None);
        assert_eq!(rows[1].create_time.timestamp(), 1_672_531_800);
    }

    #[test]
    fn test_metrics_column_count() {
        let payload = "2023-01-01 00:05:00,BTCUSDT,1,2\n";
        assert!(matches!(
            MetricsParser.parse_payload(payload.as_bytes()),
            Err(KlineVaultError::SchemaMismatch { row: 0, .. })
        ));
    }

    #[test]
    fn test_metrics_bad_time() {
        let payload = format!("{PAYLOAD}2023-13-01 00:15:00,BTCUSDT,1,2,,,,\n");
        assert!(matches!(
            MetricsParser.parse_payload(payload.as_bytes()),
            Err(KlineVaultError::EncodingError { row: 3, column: "create_time", .. })
        ));
    }
}
