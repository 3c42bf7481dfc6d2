#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/klinevault/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod checksum;
mod tracker;
mod verifier;

pub use checksum::{ChecksumError, Sidecar, compute_sha256, parse_checksum_file, sha256_file};
pub use tracker::{FileStateTracker, VerificationMarker};
pub use verifier::{ChecksumVerifier, VerificationOutcome, VerificationReport};
