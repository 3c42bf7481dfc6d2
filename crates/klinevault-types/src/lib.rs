//! Core types for the klinevault Binance Vision kline pipeline.
//!
//! - [`MarketSegment`], [`DataKind`], [`Frequency`], [`KlineInterval`] - what is published
//! - [`PathBuilder`] - mapping to remote object keys
//! - [`RemoteFileRef`], [`LocalFile`] - remote and local archive references
//! - [`KlineRow`], [`MetricsRow`] - parsed rows
//! - [`PipelineConfig`] - settings shared by every stage

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/klinevault/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod date_range;
mod error;
mod interval;
mod kline;
mod local;
mod market;
mod path;
mod remote;

pub use config::{
    DEFAULT_BASE_URL, DEFAULT_LISTING_URL, MismatchPolicy, PipelineConfig, TransferBackend,
};
pub use date_range::{DateRange, DateToken, DayIterator};
pub use error::{DateRangeError, KlineVaultError, Result};
pub use interval::KlineInterval;
pub use kline::{KLINE_COLUMNS, KlineRow, METRICS_COLUMNS, MetricsRow};
pub use local::{LocalFile, PARTIAL_SUFFIX, VERIFIED_SUFFIX, VerificationState, with_suffix};
pub use market::{DataKind, Frequency, MarketSegment};
pub use path::{PathBuilder, build_key, parse_date_from_key};
pub use remote::{ARCHIVE_SUFFIX, CHECKSUM_SUFFIX, RemoteFileRef, Symbol, key_to_path};
