//! Verified mirroring and parsing of Binance Vision kline archives.
//!
//! This is a facade crate that re-exports the klinevault workspace crates
//! and adds the [`Pipeline`] tying their stages together.

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/klinevault/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod pipeline;

pub use pipeline::{ExportOutcome, ParseReport, Pipeline, SymbolStatus, SyncReport};

// Re-export core types
pub use klinevault_types::*;

// Re-export listing and downloading
pub use klinevault_fetch::{
    Aria2Transfer, BatchListing, BatchProgress, ClientConfig, DirListing, DownloadOutcome,
    DownloadReport, Downloader, ExchangeInfoClient, FetchError, HttpClient, HttpTransfer,
    ListPage, Lister, ObjectEntry, RemoteStore, S3Store, SymbolInfo, SymbolMetadataSource,
    Transfer, TransferItem, TransferResult, auto_transfer,
};

// Re-export verification
pub use klinevault_verify::{
    ChecksumVerifier, FileStateTracker, VerificationOutcome, VerificationReport, compute_sha256,
    sha256_file,
};

// Re-export parsing
pub use klinevault_parse::{
    ArchiveParser, KlineParser, MetricsParser, ParsedTable, parse_many, parser_for,
};

// Re-export formatters
pub use klinevault_format::{
    CsvFormatter, FormatError, Formatter, JsonFormatter, JsonStyle, OutputFormat,
};

#[cfg(feature = "parquet")]
pub use klinevault_format::ParquetFormatter;

/// Prelude module for convenient imports.
///
/// ```
/// use klinevault_lib::prelude::*;
/// ```
pub mod prelude {
    pub use klinevault_types::{
        DataKind, DateRange, DateToken, Frequency, KlineInterval, KlineRow, KlineVaultError,
        LocalFile, MarketSegment, MetricsRow, MismatchPolicy, PathBuilder, PipelineConfig,
        RemoteFileRef, Result, Symbol, TransferBackend, VerificationState,
    };

    pub use klinevault_fetch::{
        BatchProgress, DownloadReport, Downloader, ExchangeInfoClient, Lister, RemoteStore,
        S3Store, SymbolMetadataSource, Transfer,
    };

    pub use klinevault_verify::{ChecksumVerifier, FileStateTracker, VerificationOutcome};

    pub use klinevault_parse::{ArchiveParser, ParsedTable, parser_for};

    pub use klinevault_format::{Formatter, OutputFormat};

    pub use crate::{Pipeline, SymbolStatus, SyncReport};
}
