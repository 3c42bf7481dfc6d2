//! Error types for klinevault.

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for klinevault operations.
pub type Result<T> = std::result::Result<T, KlineVaultError>;

/// Errors that can occur while listing, downloading, verifying or parsing data.
///
/// Only [`KlineVaultError::InvalidSchema`] and [`KlineVaultError::Config`] are
/// meant to abort a pipeline run. Every other variant is reported per unit of
/// work (per symbol or per file) inside a stage report.
#[derive(Error, Debug)]
pub enum KlineVaultError {
    /// Listing or transport failure against the remote store.
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    /// Invalid combination of segment, kind, frequency, interval or date.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// A file could not be downloaded after all attempts.
    #[error("Download failed for {key}: {reason}")]
    DownloadFailed {
        /// Remote key of the file.
        key: String,
        /// Last failure reason reported by the transfer.
        reason: String,
    },

    /// The content digest of a file does not match its sidecar.
    #[error("Checksum mismatch for {}: expected {expected}, got {actual}", file.display())]
    ChecksumMismatch {
        /// The local data file.
        file: PathBuf,
        /// Digest recorded in the sidecar.
        expected: String,
        /// Digest computed from the file.
        actual: String,
    },

    /// The archive does not contain exactly one payload entry.
    #[error("Malformed archive {}: {reason}", path.display())]
    MalformedArchive {
        /// The archive path.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// The payload has an unexpected column count or row order.
    #[error("Schema mismatch at row {row}: {reason}")]
    SchemaMismatch {
        /// Zero-based row index in the payload (header included).
        row: usize,
        /// What was wrong with the row.
        reason: String,
    },

    /// A numeric or timestamp field could not be decoded.
    #[error("Encoding error at row {row}, column {column}: {reason}")]
    EncodingError {
        /// Zero-based row index in the payload (header included).
        row: usize,
        /// Column name.
        column: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// Invalid date range.
    #[error(transparent)]
    DateRange(#[from] DateRangeError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A parsed table could not be written out.
    #[error("Export failed for {}: {reason}", path.display())]
    Export {
        /// The output file.
        path: PathBuf,
        /// Writer message.
        reason: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KlineVaultError {
    /// Returns true if this error should abort the whole pipeline.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidSchema(_) | Self::Config(_))
    }
}

/// Error for invalid date ranges.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateRangeError {
    /// Start date is after end date.
    #[error("Invalid date range: {start} > {end}")]
    InvalidRange {
        /// The start date.
        start: NaiveDate,
        /// The end date.
        end: NaiveDate,
    },
}
