//! Output format abstraction.

use klinevault_types::{KlineRow, MetricsRow};
use std::io::Write;
use thiserror::Error;

/// Output format identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    /// CSV format.
    Csv,
    /// JSON array format.
    Json,
    /// Newline-delimited JSON format.
    Ndjson,
    /// Apache Parquet format.
    #[default]
    Parquet,
}

impl OutputFormat {
    /// Returns the file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Ndjson => "ndjson",
            Self::Parquet => "parquet",
        }
    }

    /// Returns all available formats.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Csv, Self::Json, Self::Ndjson, Self::Parquet]
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "ndjson" | "jsonl" => Ok(Self::Ndjson),
            "parquet" | "pq" => Ok(Self::Parquet),
            _ => Err(FormatError::UnknownFormat(s.to_string())),
        }
    }
}

/// Errors that can occur during formatting.
#[derive(Error, Debug)]
pub enum FormatError {
    /// Unknown output format.
    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    /// The format was not compiled in.
    #[error("Format not supported in this build: {0}")]
    Unsupported(OutputFormat),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Arrow/Parquet error.
    #[error("Parquet error: {0}")]
    Parquet(String),
}

/// Trait for output formatters.
pub trait Formatter: Send + Sync {
    /// Writes candles to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_klines<W: Write + Send>(&self, rows: &[KlineRow], writer: W)
    -> Result<(), FormatError>;

    /// Writes metrics snapshots to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_metrics<W: Write + Send>(
        &self,
        rows: &[MetricsRow],
        writer: W,
    ) -> Result<(), FormatError>;

    /// Returns the file extension for this format.
    fn extension(&self) -> &str;
}

/// Writes candles in the given format.
///
/// # Errors
///
/// Returns [`FormatError::Unsupported`] if the format was not compiled in,
/// otherwise the writer's error.
pub fn write_klines<W: Write + Send>(
    format: OutputFormat,
    rows: &[KlineRow],
    writer: W,
) -> Result<(), FormatError> {
    match format {
        OutputFormat::Csv => crate::CsvFormatter::new().write_klines(rows, writer),
        OutputFormat::Json => crate::JsonFormatter::new().write_klines(rows, writer),
        OutputFormat::Ndjson => crate::JsonFormatter::ndjson().write_klines(rows, writer),
        #[cfg(feature = "parquet")]
        OutputFormat::Parquet => crate::ParquetFormatter::new().write_klines(rows, writer),
        #[cfg(not(feature = "parquet"))]
        OutputFormat::Parquet => Err(FormatError::Unsupported(format)),
    }
}

/// Writes metrics snapshots in the given format.
///
/// # Errors
///
/// Returns [`FormatError::Unsupported`] if the format was not compiled in,
/// otherwise the writer's error.
pub fn write_metrics<W: Write + Send>(
    format: OutputFormat,
    rows: &[MetricsRow],
    writer: W,
) -> Result<(), FormatError> {
    match format {
        OutputFormat::Csv => crate::CsvFormatter::new().write_metrics(rows, writer),
        OutputFormat::Json => crate::JsonFormatter::new().write_metrics(rows, writer),
        OutputFormat::Ndjson => crate::JsonFormatter::ndjson().write_metrics(rows, writer),
        #[cfg(feature = "parquet")]
        OutputFormat::Parquet => crate::ParquetFormatter::new().write_metrics(rows, writer),
        #[cfg(not(feature = "parquet"))]
        OutputFormat::Parquet => Err(FormatError::Unsupported(format)),
    }
}
