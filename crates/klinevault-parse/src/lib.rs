#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/klinevault/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod archive;
mod kline;
mod metrics;
mod parser;
pub mod timestamp;

pub use archive::{ArchiveEntry, read_single_entry, with_single_entry};
pub use kline::KlineParser;
pub use metrics::MetricsParser;
pub use parser::{ArchiveParser, ParsedTable, parse_many, parser_for};
