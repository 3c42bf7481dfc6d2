//! Listing, transfer and batched downloading of Binance Vision archives.
//!
//! - [`S3Store`] - paged bucket listings behind the [`RemoteStore`] trait
//! - [`Lister`] - symbol and archive discovery with bounded fan-out
//! - [`Downloader`] - batched, resumable mirroring with retries
//! - [`HttpTransfer`], [`Aria2Transfer`] - implementations of [`Transfer`]
//! - [`ExchangeInfoClient`] - symbol metadata from `exchangeInfo`

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/klinevault/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod downloader;
mod exchange;
mod lister;
pub mod listing;
mod store;
mod transfer;
pub mod url;

pub use client::{ClientConfig, FetchError, HttpClient};
pub use downloader::{BatchProgress, DownloadOutcome, DownloadReport, Downloader};
pub use exchange::{ExchangeInfoClient, SymbolInfo, SymbolMetadataSource, parse_exchange_info};
pub use lister::{BatchListing, Lister};
pub use listing::{DirListing, ListPage, ObjectEntry};
pub use store::{RemoteStore, S3Store};
pub use transfer::{
    Aria2Transfer, HttpTransfer, Transfer, TransferItem, TransferResult, auto_transfer,
};
