//! SHA-256 digests and `.CHECKSUM` sidecars.
//!
//! Sidecar format, one line:
//! ```text
//! d7a8fbb307d7809469ca9abcb0082e4f8d5651e46d3cdb762d02d0bf37c9e592  BTCUSDT-1m-2023-01-01.zip
//! ```

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;

/// Read buffer for streaming digests.
const DIGEST_CHUNK: usize = 64 * 1024;

/// Sidecar decoding errors.
#[derive(Error, Debug)]
pub enum ChecksumError {
    /// Sidecar content is not `<sha256-hex>  <file name>`.
    #[error("Invalid checksum format: {0}")]
    InvalidFormat(String),

    /// Reading the sidecar or the data file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parsed content of a `.CHECKSUM` sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sidecar {
    /// Lowercase hex SHA-256 digest.
    pub digest: String,
    /// File name recorded next to the digest, if any.
    pub file_name: Option<String>,
}

/// Parses sidecar content.
///
/// # Errors
///
/// Returns [`ChecksumError::InvalidFormat`] for empty content or a digest
/// that is not 64 hex characters.
pub fn parse_checksum_file(content: &str) -> Result<Sidecar, ChecksumError> {
    let mut parts = content.split_whitespace();
    let digest = parts
        .next()
        .ok_or_else(|| ChecksumError::InvalidFormat("empty checksum file".to_string()))?;

    if digest.len() != 64 {
        return Err(ChecksumError::InvalidFormat(format!(
            "invalid SHA-256 length: {} (expected 64)",
            digest.len()
        )));
    }
    if !digest.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ChecksumError::InvalidFormat(format!(
            "invalid SHA-256 digest: {digest}"
        )));
    }

    Ok(Sidecar {
        digest: digest.to_lowercase(),
        file_name: parts.next().map(|name| name.trim_start_matches('*').to_string()),
    })
}

/// Reads and parses a sidecar; `Ok(None)` when it does not exist.
///
/// # Errors
///
/// Returns an error if the sidecar exists but cannot be read or parsed.
pub fn read_sidecar(path: &Path) -> Result<Option<Sidecar>, ChecksumError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_checksum_file(&content).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Computes the SHA-256 of in-memory data as lowercase hex.
#[must_use]
pub fn compute_sha256(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Streams a file through SHA-256 without loading it into memory.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut reader = BufReader::with_capacity(DIGEST_CHUNK, File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; DIGEST_CHUNK];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
