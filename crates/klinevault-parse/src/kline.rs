//! Kline payload decoding.

use klinevault_types::{KLINE_COLUMNS, KlineRow, KlineVaultError, Result};
use std::io::Read;

use crate::parser::{ArchiveParser, ParsedTable, decimal, expect_columns, read_records, time};
use crate::timestamp::parse_epoch;

/// Parser for kline-shaped payloads (klines and the mark, index and premium
/// index price variants).
///
/// The first row is a header iff its first field is not an epoch timestamp.
/// Open times must be strictly increasing.
#[derive(Debug, Clone, Copy, Default)]
pub struct KlineParser;

impl ArchiveParser for KlineParser {
    fn name(&self) -> &'static str {
        "klines"
    }

    fn parse_reader(&self, reader: &mut dyn Read) -> Result<ParsedTable> {
        let mut rows: Vec<KlineRow> = Vec::new();

        for (row, record) in read_records(reader, &KLINE_COLUMNS) {
            let record = record?;
            if row == 0 && parse_epoch(&record[0]).is_none() {
                expect_columns(&record, row, KLINE_COLUMNS.len())?;
                continue;
            }
            expect_columns(&record, row, KLINE_COLUMNS.len())?;

            let trade_count = record[8]
                .parse::<u64>()
                .map_err(|e| KlineVaultError::EncodingError {
                    row,
                    column: KLINE_COLUMNS[8],
                    reason: format!("{:?}: {e}", &record[8]),
                })?;

            let kline = KlineRow {
                open_time: time(&record, row, 0, KLINE_COLUMNS[0], parse_epoch)?,
                open: decimal(&record, row, 1, KLINE_COLUMNS[1])?,
                high: decimal(&record, row, 2, KLINE_COLUMNS[2])?,
                low: decimal(&record, row, 3, KLINE_COLUMNS[3])?,
                close: decimal(&record, row, 4, KLINE_COLUMNS[4])?,
                volume: decimal(&record, row, 5, KLINE_COLUMNS[5])?,
                close_time: time(&record, row, 6, KLINE_COLUMNS[6], parse_epoch)?,
                quote_volume: decimal(&record, row, 7, KLINE_COLUMNS[7])?,
                trade_count,
                taker_buy_base_volume: decimal(&record, row, 9, KLINE_COLUMNS[9])?,
                taker_buy_quote_volume: decimal(&record, row, 10, KLINE_COLUMNS[10])?,
            };

            if let Some(previous) = rows.last()
                && kline.open_time <= previous.open_time
            {
                return Err(KlineVaultError::SchemaMismatch {
                    row,
                    reason: format!(
                        "open time {} does not follow {}",
                        kline.open_time, previous.open_time
                    ),
                });
            }
            rows.push(kline);
        }

        Ok(ParsedTable::Klines(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::write_zip;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    const HEADER: &str = "open_time,open,high,low,close,volume,close_time,quote_volume,count,taker_buy_volume,taker_buy_quote_volume,ignore\n";

    fn body(rows: usize, start_ms: i64) -> String {
        (0..rows)
            .map(|i| {
                let open = start_ms + i as i64 * 60_000;
                format!(
                    "{open},16541.77,16545.70,16508.39,16529.67,{i}.5,{},3004.1,{},1.25,20650.3,0\n",
                    open + 59_999,
                    100 + i
                )
            })
            .collect()
    }

    fn klines(table: ParsedTable) -> Vec<KlineRow> {
        match table {
            ParsedTable::Klines(rows) => rows,
            ParsedTable::Metrics(_) => panic!("expected klines"),
        }
    }

    #[test]
    fn test_header_and_headerless_agree() {
        let plain = body(5, 1_672_531_200_000);
        let with_header = format!("{HEADER}{plain}");

        let a = klines(KlineParser.parse_payload(plain.as_bytes()).unwrap());
        let b = klines(KlineParser.parse_payload(with_header.as_bytes()).unwrap());
        assert_eq!(a.len(), 5);
        assert_eq!(a, b);

        assert_eq!(a[0].open, Decimal::from_str("16541.77").unwrap());
        assert_eq!(a[2].volume, Decimal::from_str("2.5").unwrap());
        assert_eq!(a[4].trade_count, 104);
        assert_eq!(a[0].open_time.timestamp_millis(), 1_672_531_200_000);
        assert_eq!(a[0].close_time.timestamp_millis(), 1_672_531_259_999);
    }

    #[test]
    fn test_microsecond_payload() {
        let micros: String = body(3, 1_735_689_600_000)
            .lines()
            .map(|line| {
                let mut fields: Vec<String> = line.split(',').map(str::to_string).collect();
                fields[0] = format!("{}000", fields[0]);
                fields[6] = format!("{}999", fields[6]);
                format!("{}\n", fields.join(","))
            })
            .collect();
        let rows = klines(KlineParser.parse_payload(micros.as_bytes()).unwrap());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].open_time.timestamp_millis(), 1_735_689_660_000);
    }

    #[test]
    fn test_wrong_column_count() {
        let payload = "1672531200000,1,2,0.5,1.5,10,1672531259999,15,3,4,6\n";
        assert!(matches!(
            KlineParser.parse_payload(payload.as_bytes()),
            Err(KlineVaultError::SchemaMismatch { row: 0, .. })
        ));

        let short_header = "open_time,open,high\n";
        assert!(matches!(
            KlineParser.parse_payload(short_header.as_bytes()),
            Err(KlineVaultError::SchemaMismatch { row: 0, .. })
        ));
    }

    #[test]
    fn test_non_increasing_open_time() {
        let mut payload = body(2, 1_672_531_200_000);
        payload.push_str(&body(1, 1_672_531_200_000));
        assert!(matches!(
            KlineParser.parse_payload(payload.as_bytes()),
            Err(KlineVaultError::SchemaMismatch { row: 2, .. })
        ));
    }

    #[test]
    fn test_bad_number() {
        let payload = body(2, 1_672_531_200_000).replace("16545.70", "n/a");
        assert!(matches!(
            KlineParser.parse_payload(payload.as_bytes()),
            Err(KlineVaultError::EncodingError { row: 0, column: "high", .. })
        ));

        let payload = format!(
            "{}1672531320000,1,1,1,1,1,oops,1,1,1,1,0\n",
            body(2, 1_672_531_200_000)
        );
        assert!(matches!(
            KlineParser.parse_payload(payload.as_bytes()),
            Err(KlineVaultError::EncodingError { row: 2, column: "close_time", .. })
        ));
    }

    #[test]
    fn test_invalid_utf8_is_encoding_error() {
        let mut payload = body(2, 1_672_531_200_000).into_bytes();
        let at = payload
            .windows(8)
            .position(|w| w == b"16529.67")
            .unwrap();
        payload[at + 7] = 0xff;
        assert!(matches!(
            KlineParser.parse_payload(&payload),
            Err(KlineVaultError::EncodingError { row: 0, column: "close", .. })
        ));
    }

    /// Hands out one byte per read.
    struct Trickle<'a>(&'a [u8]);

    impl std::io::Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let Some((first, rest)) = self.0.split_first() else {
                return Ok(0);
            };
            match buf.first_mut() {
                Some(slot) => {
                    *slot = *first;
                    self.0 = rest;
                    Ok(1)
                }
                None => Ok(0),
            }
        }
    }

    #[test]
    fn test_reader_input_matches_slice_input() {
        let csv = format!("{HEADER}{}", body(6, 1_672_531_200_000));
        let streamed = KlineParser
            .parse_reader(&mut Trickle(csv.as_bytes()))
            .unwrap();
        assert_eq!(streamed, KlineParser.parse_payload(csv.as_bytes()).unwrap());
        assert_eq!(streamed.len(), 6);
    }

    #[test]
    fn test_parse_archive() {
        let dir = tempfile::tempdir().unwrap();
        let csv = format!("{HEADER}{}", body(4, 1_672_531_200_000));
        let path = write_zip(
            dir.path(),
            "BTCUSDT-1m-2023-01-01.zip",
            &[("BTCUSDT-1m-2023-01-01.csv", &csv)],
        );
        let table = KlineParser.parse(&path).unwrap();
        assert_eq!(table.len(), 4);
        let (first, last) = table.time_span().unwrap();
        assert!(first < last);
    }

    #[test]
    fn test_empty_payload() {
        let table = KlineParser.parse_payload(b"").unwrap();
        assert!(table.is_empty());
        assert!(table.time_span().is_none());
    }
}
