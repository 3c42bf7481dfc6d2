//! Apache Parquet output format.

use arrow::array::{ArrayRef, Decimal128Array, StringArray, TimestampMicrosecondArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use klinevault_types::{KlineRow, MetricsRow};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use rust_decimal::Decimal;
use std::io::Write;
use std::sync::Arc;

use crate::{FormatError, Formatter};

/// Precision of decimal columns.
pub const DECIMAL_PRECISION: u8 = 38;

/// Scale of decimal columns.
pub const DECIMAL_SCALE: i8 = 8;

/// Parquet formatter.
#[derive(Debug, Clone)]
pub struct ParquetFormatter {
    /// Row group size (number of rows per group).
    row_group_size: usize,
    /// Compression codec.
    compression: Compression,
}

impl Default for ParquetFormatter {
    fn default() -> Self {
        Self {
            row_group_size: 100_000,
            compression: Compression::SNAPPY,
        }
    }
}

fn timestamp_field(name: &str, nullable: bool) -> Field {
    Field::new(
        name,
        DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
        nullable,
    )
}

fn decimal_field(name: &str, nullable: bool) -> Field {
    Field::new(
        name,
        DataType::Decimal128(DECIMAL_PRECISION, DECIMAL_SCALE),
        nullable,
    )
}

/// Converts a decimal to its unscaled `Decimal128(38, 8)` value, rounding
/// extra fractional digits.
fn unscaled(value: Decimal) -> Result<i128, FormatError> {
    let rounded = value.round_dp(DECIMAL_SCALE as u32);
    let shift = DECIMAL_SCALE as u32 - rounded.scale();
    rounded
        .mantissa()
        .checked_mul(10i128.pow(shift))
        .ok_or_else(|| FormatError::Parquet(format!("{value} does not fit Decimal128")))
}

fn decimal_column(values: impl Iterator<Item = Decimal>) -> Result<ArrayRef, FormatError> {
    let values = values.map(unscaled).collect::<Result<Vec<_>, _>>()?;
    let array = Decimal128Array::from(values)
        .with_precision_and_scale(DECIMAL_PRECISION, DECIMAL_SCALE)
        .map_err(|e| FormatError::Parquet(e.to_string()))?;
    Ok(Arc::new(array))
}

fn optional_decimal_column(
    values: impl Iterator<Item = Option<Decimal>>,
) -> Result<ArrayRef, FormatError> {
    let values = values
        .map(|v| v.map(unscaled).transpose())
        .collect::<Result<Vec<_>, _>>()?;
    let array = Decimal128Array::from(values)
        .with_precision_and_scale(DECIMAL_PRECISION, DECIMAL_SCALE)
        .map_err(|e| FormatError::Parquet(e.to_string()))?;
    Ok(Arc::new(array))
}

fn timestamp_column(values: impl Iterator<Item = i64>) -> ArrayRef {
    Arc::new(TimestampMicrosecondArray::from(values.collect::<Vec<_>>()).with_timezone("UTC"))
}

impl ParquetFormatter {
    /// Creates a new Parquet formatter with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the row group size.
    #[must_use]
    pub const fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// Sets the compression codec.
    #[must_use]
    pub const fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Creates the Arrow schema for candles.
    fn kline_schema() -> Schema {
        Schema::new(vec![
            timestamp_field("open_time", false),
            decimal_field("open", false),
            decimal_field("high", false),
            decimal_field("low", false),
            decimal_field("close", false),
            decimal_field("volume", false),
            timestamp_field("close_time", false),
            decimal_field("quote_volume", false),
            Field::new("trade_count", DataType::UInt64, false),
            decimal_field("taker_buy_base_volume", false),
            decimal_field("taker_buy_quote_volume", false),
        ])
    }

    /// Creates the Arrow schema for metrics snapshots.
    fn metrics_schema() -> Schema {
        Schema::new(vec![
            timestamp_field("create_time", false),
            Field::new("symbol", DataType::Utf8, false),
            decimal_field("sum_open_interest", false),
            decimal_field("sum_open_interest_value", false),
            decimal_field("count_toptrader_long_short_ratio", true),
            decimal_field("sum_toptrader_long_short_ratio", true),
            decimal_field("count_long_short_ratio", true),
            decimal_field("sum_taker_long_short_vol_ratio", true),
        ])
    }

    fn klines_to_batch(rows: &[KlineRow]) -> Result<RecordBatch, FormatError> {
        let columns: Vec<ArrayRef> = vec![
            timestamp_column(rows.iter().map(|r| r.open_time.timestamp_micros())),
            decimal_column(rows.iter().map(|r| r.open))?,
            decimal_column(rows.iter().map(|r| r.high))?,
            decimal_column(rows.iter().map(|r| r.low))?,
            decimal_column(rows.iter().map(|r| r.close))?,
            decimal_column(rows.iter().map(|r| r.volume))?,
            timestamp_column(rows.iter().map(|r| r.close_time.timestamp_micros())),
            decimal_column(rows.iter().map(|r| r.quote_volume))?,
            Arc::new(UInt64Array::from(
                rows.iter().map(|r| r.trade_count).collect::<Vec<_>>(),
            )),
            decimal_column(rows.iter().map(|r| r.taker_buy_base_volume))?,
            decimal_column(rows.iter().map(|r| r.taker_buy_quote_volume))?,
        ];

        RecordBatch::try_new(Arc::new(Self::kline_schema()), columns)
            .map_err(|e| FormatError::Parquet(e.to_string()))
    }

    fn metrics_to_batch(rows: &[MetricsRow]) -> Result<RecordBatch, FormatError> {
        let columns: Vec<ArrayRef> = vec![
            timestamp_column(rows.iter().map(|r| r.create_time.timestamp_micros())),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.symbol.as_str()),
            )),
            decimal_column(rows.iter().map(|r| r.sum_open_interest))?,
            decimal_column(rows.iter().map(|r| r.sum_open_interest_value))?,
            optional_decimal_column(rows.iter().map(|r| r.count_toptrader_long_short_ratio))?,
            optional_decimal_column(rows.iter().map(|r| r.sum_toptrader_long_short_ratio))?,
            optional_decimal_column(rows.iter().map(|r| r.count_long_short_ratio))?,
            optional_decimal_column(rows.iter().map(|r| r.sum_taker_long_short_vol_ratio))?,
        ];

        RecordBatch::try_new(Arc::new(Self::metrics_schema()), columns)
            .map_err(|e| FormatError::Parquet(e.to_string()))
    }

    fn write_batches<T, W: Write + Send>(
        &self,
        rows: &[T],
        schema: Schema,
        to_batch: fn(&[T]) -> Result<RecordBatch, FormatError>,
        writer: W,
    ) -> Result<(), FormatError> {
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build();

        let mut arrow_writer = ArrowWriter::try_new(writer, Arc::new(schema), Some(props))
            .map_err(|e| FormatError::Parquet(e.to_string()))?;

        for chunk in rows.chunks(self.row_group_size.max(1)) {
            let batch = to_batch(chunk)?;
            arrow_writer
                .write(&batch)
                .map_err(|e| FormatError::Parquet(e.to_string()))?;
        }

        arrow_writer
            .close()
            .map_err(|e| FormatError::Parquet(e.to_string()))?;

        Ok(())
    }
}

impl Formatter for ParquetFormatter {
    fn write_klines<W: Write + Send>(
        &self,
        rows: &[KlineRow],
        writer: W,
    ) -> Result<(), FormatError> {
        self.write_batches(rows, Self::kline_schema(), Self::klines_to_batch, writer)
    }

    fn write_metrics<W: Write + Send>(
        &self,
        rows: &[MetricsRow],
        writer: W,
    ) -> Result<(), FormatError> {
        self.write_batches(rows, Self::metrics_schema(), Self::metrics_to_batch, writer)
    }

    fn extension(&self) -> &str {
        "parquet"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_rows::{kline, metrics};
    use arrow::array::Array;
    use std::io::Cursor;
    use std::str::FromStr;

    #[test]
    fn test_parquet_klines() {
        let formatter = ParquetFormatter::new();
        let mut output = Cursor::new(Vec::new());

        formatter
            .write_klines(&[kline(0), kline(1)], &mut output)
            .unwrap();

        // Parquet files start with "PAR1" magic bytes
        let data = output.into_inner();
        assert!(data.len() > 4);
        assert_eq!(&data[0..4], b"PAR1");
    }

    #[test]
    fn test_parquet_metrics() {
        let mut output = Cursor::new(Vec::new());
        ParquetFormatter::new()
            .write_metrics(&[metrics()], &mut output)
            .unwrap();
        assert_eq!(&output.into_inner()[0..4], b"PAR1");
    }

    #[test]
    fn test_unscaled() {
        assert_eq!(
            unscaled(Decimal::from_str("16541.77").unwrap()).unwrap(),
            1_654_177_000_000
        );
        assert_eq!(
            unscaled(Decimal::from_str("0.123456789").unwrap()).unwrap(),
            12_345_679
        );
    }

    #[test]
    fn test_kline_batch() {
        let batch = ParquetFormatter::klines_to_batch(&[kline(0), kline(1)]).unwrap();
        assert_eq!(batch.num_rows(), 2);
        let open = batch
            .column(1)
            .as_any()
            .downcast_ref::<Decimal128Array>()
            .unwrap();
        assert_eq!(open.value_as_string(0), "16541.77000000");
    }

    #[test]
    fn test_metrics_nulls() {
        let batch = ParquetFormatter::metrics_to_batch(&[metrics()]).unwrap();
        assert_eq!(batch.column(5).null_count(), 1);
        assert_eq!(batch.column(4).null_count(), 0);
    }

    #[test]
    fn test_schemas() {
        assert_eq!(ParquetFormatter::kline_schema().fields().len(), 11);
        assert_eq!(ParquetFormatter::metrics_schema().fields().len(), 8);
    }
}
