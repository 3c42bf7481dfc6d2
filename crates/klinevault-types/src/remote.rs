//! Symbols and references to remote archive files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{DataKind, DateToken, Frequency, KlineInterval, MarketSegment};

/// Suffix appended to a data key to form its checksum sidecar key.
pub const CHECKSUM_SUFFIX: &str = ".CHECKSUM";

/// Suffix of archive objects.
pub const ARCHIVE_SUFFIX: &str = ".zip";

/// Exchange symbol (e.g. `BTCUSDT`).
///
/// Symbols are kept exactly as the remote store lists them and compared
/// byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Creates a new symbol.
    #[must_use]
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    /// Returns the symbol as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reference to one dated archive in the remote store.
///
/// Built by [`crate::PathBuilder`]; two references are the same file when
/// their keys are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteFileRef {
    segment: MarketSegment,
    kind: DataKind,
    frequency: Frequency,
    symbol: Symbol,
    interval: Option<KlineInterval>,
    date: DateToken,
    key: String,
    checksum_key: String,
}

impl RemoteFileRef {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        segment: MarketSegment,
        kind: DataKind,
        frequency: Frequency,
        symbol: Symbol,
        interval: Option<KlineInterval>,
        date: DateToken,
        key: String,
    ) -> Self {
        let checksum_key = format!("{key}{CHECKSUM_SUFFIX}");
        Self {
            segment,
            kind,
            frequency,
            symbol,
            interval,
            date,
            key,
            checksum_key,
        }
    }

    /// Returns the market segment.
    #[must_use]
    pub const fn segment(&self) -> MarketSegment {
        self.segment
    }

    /// Returns the data kind.
    #[must_use]
    pub const fn kind(&self) -> DataKind {
        self.kind
    }

    /// Returns the publication frequency.
    #[must_use]
    pub const fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Returns the symbol.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Returns the kline interval, if the kind is kline-shaped.
    #[must_use]
    pub const fn interval(&self) -> Option<KlineInterval> {
        self.interval
    }

    /// Returns the date token.
    #[must_use]
    pub const fn date(&self) -> DateToken {
        self.date
    }

    /// Returns the object key of the archive.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the object key of the checksum sidecar.
    #[must_use]
    pub fn checksum_key(&self) -> &str {
        &self.checksum_key
    }

    /// Returns the archive file name (last key segment).
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }

    /// Returns where the archive is stored under the given data root.
    #[must_use]
    pub fn local_path(&self, root: &Path) -> PathBuf {
        key_to_path(root, &self.key)
    }

    /// Returns where the checksum sidecar is stored under the given data root.
    #[must_use]
    pub fn local_checksum_path(&self, root: &Path) -> PathBuf {
        key_to_path(root, &self.checksum_key)
    }
}

/// Mirrors a slash-separated object key under a local root.
#[must_use]
pub fn key_to_path(root: &Path, key: &str) -> PathBuf {
    key.split('/')
        .filter(|part| !part.is_empty())
        .fold(root.to_path_buf(), |path, part| path.join(part))
}
