//! The [`ArchiveParser`] trait and parser selection.

use chrono::{DateTime, Utc};
use csv::{ErrorKind, ReaderBuilder, StringRecord, Trim};
use klinevault_types::{DataKind, KlineRow, KlineVaultError, MetricsRow, Result};
use rayon::prelude::*;
use rust_decimal::Decimal;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::archive::with_single_entry;
use crate::{KlineParser, MetricsParser};

/// Decoded content of one archive.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedTable {
    /// Candles, in source order.
    Klines(Vec<KlineRow>),
    /// Open-interest snapshots, in source order.
    Metrics(Vec<MetricsRow>),
}

impl ParsedTable {
    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Klines(rows) => rows.len(),
            Self::Metrics(rows) => rows.len(),
        }
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the candles of a kline table.
    #[must_use]
    pub fn as_klines(&self) -> Option<&[KlineRow]> {
        match self {
            Self::Klines(rows) => Some(rows),
            Self::Metrics(_) => None,
        }
    }

    /// Returns the snapshots of a metrics table.
    #[must_use]
    pub fn as_metrics(&self) -> Option<&[MetricsRow]> {
        match self {
            Self::Metrics(rows) => Some(rows),
            Self::Klines(_) => None,
        }
    }

    /// Returns the first and last row time.
    #[must_use]
    pub fn time_span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match self {
            Self::Klines(rows) => Some((rows.first()?.open_time, rows.last()?.open_time)),
            Self::Metrics(rows) => Some((rows.first()?.create_time, rows.last()?.create_time)),
        }
    }
}

/// Decodes the payload of a verified archive into a typed table.
pub trait ArchiveParser: Send + Sync + std::fmt::Debug {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Decodes a CSV payload read incrementally from `reader`.
    ///
    /// # Errors
    ///
    /// Returns [`KlineVaultError::SchemaMismatch`] or
    /// [`KlineVaultError::EncodingError`] for rows that do not fit the schema,
    /// and [`KlineVaultError::Io`] if `reader` fails.
    fn parse_reader(&self, reader: &mut dyn Read) -> Result<ParsedTable>;

    /// Decodes an extracted CSV payload.
    ///
    /// # Errors
    ///
    /// See [`ArchiveParser::parse_reader`].
    fn parse_payload(&self, payload: &[u8]) -> Result<ParsedTable> {
        let mut payload = payload;
        self.parse_reader(&mut payload)
    }

    /// Decodes the archive at `path`, streaming its entry through the CSV
    /// reader.
    ///
    /// # Errors
    ///
    /// Returns [`KlineVaultError::MalformedArchive`] if the archive does not
    /// hold exactly one entry or its data is corrupt, otherwise the errors of
    /// [`ArchiveParser::parse_reader`].
    fn parse(&self, path: &Path) -> Result<ParsedTable> {
        with_single_entry(path, |entry, reader| {
            let table = self.parse_reader(reader)?;
            debug!(
                event_type = "archive_parsed",
                parser = self.name(),
                file = %path.display(),
                entry = %entry,
                rows = table.len(),
                "Parsed archive"
            );
            Ok(table)
        })
    }
}

/// Returns the parser for a data kind.
///
/// # Errors
///
/// Returns [`KlineVaultError::InvalidSchema`] for kinds without a parser.
pub fn parser_for(kind: DataKind) -> Result<Box<dyn ArchiveParser>> {
    if kind.is_kline() {
        return Ok(Box::new(KlineParser));
    }
    match kind {
        DataKind::Metrics => Ok(Box::new(MetricsParser)),
        other => Err(KlineVaultError::InvalidSchema(format!(
            "no parser for {other}"
        ))),
    }
}

/// Parses many archives in parallel, returning results in input order.
pub fn parse_many(
    parser: &dyn ArchiveParser,
    paths: &[PathBuf],
) -> Vec<(PathBuf, Result<ParsedTable>)> {
    paths
        .par_iter()
        .map(|path| {
            let result = parser.parse(path);
            if let Err(e) = &result {
                warn!(
                    event_type = "parse_failed",
                    file = %path.display(),
                    error = %e,
                    "Archive could not be parsed"
                );
            }
            (path.clone(), result)
        })
        .collect()
}

/// Reads CSV records with their zero-based row index.
///
/// Rows may have any width; column counts are checked by the caller. Invalid
/// UTF-8 is reported against the column named by `columns`.
pub(crate) fn read_records<R: Read>(
    reader: R,
    columns: &'static [&'static str],
) -> impl Iterator<Item = (usize, Result<StringRecord>)> {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader)
        .into_records()
        .enumerate()
        .map(move |(row, record)| (row, record.map_err(|e| record_error(e, row, columns))))
}

fn record_error(
    error: csv::Error,
    row: usize,
    columns: &'static [&'static str],
) -> KlineVaultError {
    match error.kind() {
        ErrorKind::Utf8 { err, .. } => KlineVaultError::EncodingError {
            row,
            column: columns.get(err.field()).copied().unwrap_or("unknown"),
            reason: format!("invalid UTF-8 after byte {}", err.valid_up_to()),
        },
        ErrorKind::Io(_) => KlineVaultError::Io(error.into()),
        _ => KlineVaultError::SchemaMismatch {
            row,
            reason: error.to_string(),
        },
    }
}

pub(crate) fn expect_columns(record: &StringRecord, row: usize, expected: usize) -> Result<()> {
    if record.len() == expected {
        Ok(())
    } else {
        Err(KlineVaultError::SchemaMismatch {
            row,
            reason: format!("expected {expected} columns, found {}", record.len()),
        })
    }
}

pub(crate) fn decimal(
    record: &StringRecord,
    row: usize,
    index: usize,
    column: &'static str,
) -> Result<Decimal> {
    let field = &record[index];
    Decimal::from_str(field)
        .or_else(|_| Decimal::from_scientific(field))
        .map_err(|e| KlineVaultError::EncodingError {
            row,
            column,
            reason: format!("{field:?}: {e}"),
        })
}

pub(crate) fn optional_decimal(
    record: &StringRecord,
    row: usize,
    index: usize,
    column: &'static str,
) -> Result<Option<Decimal>> {
    if record[index].is_empty() {
        Ok(None)
    } else {
        decimal(record, row, index, column).map(Some)
    }
}

pub(crate) fn time(
    record: &StringRecord,
    row: usize,
    index: usize,
    column: &'static str,
    decode: fn(&str) -> Option<DateTime<Utc>>,
) -> Result<DateTime<Utc>> {
    decode(&record[index]).ok_or_else(|| KlineVaultError::EncodingError {
        row,
        column,
        reason: format!("{:?} is not a timestamp", &record[index]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::write_zip;

    #[test]
    fn test_parser_selection() {
        assert_eq!(parser_for(DataKind::Klines).unwrap().name(), "klines");
        assert_eq!(
            parser_for(DataKind::PremiumIndexKlines).unwrap().name(),
            "klines"
        );
        assert_eq!(parser_for(DataKind::Metrics).unwrap().name(), "metrics");
        assert!(matches!(
            parser_for(DataKind::AggTrades),
            Err(KlineVaultError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_parse_many_keeps_order_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_zip(
            dir.path(),
            "good.zip",
            &[(
                "good.csv",
                "1672531200000,1,2,0.5,1.5,10,1672531259999,15,3,4,6,0\n",
            )],
        );
        let bad = write_zip(dir.path(), "bad.zip", &[("a.csv", "1"), ("b.csv", "2")]);

        let results = parse_many(&KlineParser, &[good.clone(), bad.clone()]);
        assert_eq!(results[0].0, good);
        assert_eq!(results[0].1.as_ref().unwrap().len(), 1);
        assert_eq!(results[1].0, bad);
        assert!(matches!(
            results[1].1,
            Err(KlineVaultError::MalformedArchive { .. })
        ));
    }

    #[test]
    fn test_corrupt_entry_data_is_malformed() {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stored.zip");
        let mut writer = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
        writer
            .start_file(
                "stored.csv",
                SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored),
            )
            .unwrap();
        writer
            .write_all(b"1672531200000,1,2,0.5,1.5,10,1672531259999,15,3,4,6,0\n")
            .unwrap();
        writer.finish().unwrap();

        // Same length and still valid CSV; only the entry CRC disagrees.
        let mut bytes = std::fs::read(&path).unwrap();
        let at = bytes.windows(4).position(|w| w == b",1.5").unwrap();
        bytes[at + 3] = b'7';
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(
            KlineParser.parse(&path),
            Err(KlineVaultError::MalformedArchive { .. })
        ));
    }

    #[test]
    fn test_decimal_forms() {
        let record = StringRecord::from(vec!["16500.01000000", "1E-8", "", "abc"]);
        assert_eq!(
            decimal(&record, 0, 0, "open").unwrap(),
            Decimal::from_str("16500.01").unwrap()
        );
        assert_eq!(
            decimal(&record, 0, 1, "open").unwrap(),
            Decimal::from_str("0.00000001").unwrap()
        );
        assert_eq!(optional_decimal(&record, 0, 2, "ratio").unwrap(), None);
        assert!(matches!(
            decimal(&record, 3, 3, "close"),
            Err(KlineVaultError::EncodingError { row: 3, column: "close", .. })
        ));
    }
}
