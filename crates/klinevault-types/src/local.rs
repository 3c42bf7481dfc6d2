//! Local files and their verification state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{CHECKSUM_SUFFIX, DateToken, Result, parse_date_from_key};

/// Suffix of the marker written next to a verified archive.
pub const VERIFIED_SUFFIX: &str = ".verified";

/// Suffix of in-flight transfers.
pub const PARTIAL_SUFFIX: &str = ".part";

/// An archive present under the local data root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalFile {
    path: PathBuf,
    size: u64,
    modified: DateTime<Utc>,
}

impl LocalFile {
    /// Reads size and modification time of an existing file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file metadata cannot be read.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let metadata = std::fs::metadata(&path)?;
        let modified = metadata.modified().map(DateTime::<Utc>::from)?;
        Ok(Self {
            path,
            size: metadata.len(),
            modified,
        })
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the size in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Returns the last modification time.
    #[must_use]
    pub const fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    /// Returns the file name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }

    /// Returns the date token encoded in the file name.
    #[must_use]
    pub fn date(&self) -> Option<DateToken> {
        parse_date_from_key(self.file_name()).ok()
    }

    /// Returns the path of the checksum sidecar.
    #[must_use]
    pub fn checksum_path(&self) -> PathBuf {
        with_suffix(&self.path, CHECKSUM_SUFFIX)
    }

    /// Returns the path of the verification marker.
    #[must_use]
    pub fn marker_path(&self) -> PathBuf {
        with_suffix(&self.path, VERIFIED_SUFFIX)
    }
}

/// Appends a suffix to the full file name (`a.zip` -> `a.zip.CHECKSUM`).
#[must_use]
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Verification state of a local archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VerificationState {
    /// Not yet verified, or its marker went stale.
    #[default]
    Unverified,
    /// Digest matched the sidecar.
    Verified,
    /// Digest did not match the sidecar.
    Mismatched,
}

impl std::fmt::Display for VerificationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unverified => "unverified",
            Self::Verified => "verified",
            Self::Mismatched => "mismatched",
        };
        f.write_str(s)
    }
}
