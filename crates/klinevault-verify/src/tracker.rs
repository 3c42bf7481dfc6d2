//! Verification state of local archives.
//!
//! State lives next to each archive as a small JSON marker
//! (`<archive>.verified`). A marker only counts while the digest it records
//! still matches the current `.CHECKSUM` sidecar and the archive still has the
//! size and modification time it had when checked, so a re-downloaded sidecar
//! or archive makes the archive unverified again.

use chrono::{DateTime, Utc};
use klinevault_types::{
    ARCHIVE_SUFFIX, DateRange, DateToken, Frequency, KlineVaultError, LocalFile, PathBuilder,
    Result, Symbol, VerificationState, key_to_path,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::checksum::read_sidecar;

/// Persisted verification marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationMarker {
    /// Sidecar digest the archive was checked against.
    pub digest: String,
    /// Archive size when checked.
    pub size: u64,
    /// Archive modification time when checked.
    pub modified: DateTime<Utc>,
    /// When the check ran.
    pub verified_at: DateTime<Utc>,
    /// Outcome of the check.
    pub state: VerificationState,
}

/// Tracks which archives under a directory have been verified.
#[derive(Debug, Clone)]
pub struct FileStateTracker {
    dir: PathBuf,
}

impl FileStateTracker {
    /// Creates a tracker over every archive below `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates a tracker over the local mirror of one symbol's archives.
    #[must_use]
    pub fn for_symbol(root: &Path, builder: &PathBuilder, symbol: &Symbol) -> Self {
        Self::new(key_to_path(root, &builder.symbol_prefix(symbol)))
    }

    /// Returns the tracked directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lists every archive below the directory, sorted by path.
    ///
    /// A missing directory yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a directory cannot be read.
    pub fn scan(&self) -> Result<Vec<LocalFile>> {
        let mut files = Vec::new();
        if self.dir.is_dir() {
            collect_archives(&self.dir, &mut files)?;
        }
        files.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(files)
    }

    /// Returns the current state of one archive.
    ///
    /// A missing, unreadable or stale marker reads as
    /// [`VerificationState::Unverified`].
    #[must_use]
    pub fn state_of(file: &LocalFile) -> VerificationState {
        let Some(marker) = read_marker(&file.marker_path()) else {
            return VerificationState::Unverified;
        };
        if marker.size != file.size() || marker.modified != file.modified() {
            debug!(
                event_type = "marker_stale",
                file = %file.path().display(),
                "Archive changed since it was verified"
            );
            return VerificationState::Unverified;
        }
        match read_sidecar(&file.checksum_path()) {
            Ok(Some(sidecar)) if sidecar.digest == marker.digest => marker.state,
            _ => {
                debug!(
                    event_type = "marker_stale",
                    file = %file.path().display(),
                    "Verification marker no longer matches sidecar"
                );
                VerificationState::Unverified
            }
        }
    }

    /// Archives without a valid marker.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be scanned.
    pub fn unverified(&self) -> Result<Vec<LocalFile>> {
        self.in_state(VerificationState::Unverified)
    }

    /// Archives whose digest matched their sidecar.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be scanned.
    pub fn verified(&self) -> Result<Vec<LocalFile>> {
        self.in_state(VerificationState::Verified)
    }

    /// Archives whose digest did not match their sidecar.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be scanned.
    pub fn mismatched(&self) -> Result<Vec<LocalFile>> {
        self.in_state(VerificationState::Mismatched)
    }

    /// Verified archives whose date token overlaps `range`, sorted by date.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be scanned.
    pub fn verified_in_range(&self, range: &DateRange) -> Result<Vec<LocalFile>> {
        let mut files: Vec<LocalFile> = self
            .verified()?
            .into_iter()
            .filter(|file| file.date().is_some_and(|date| range.overlaps(&date)))
            .collect();
        files.sort_by_key(LocalFile::date);
        Ok(files)
    }

    /// Date tokens of `range` at `frequency` with no verified archive.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be scanned.
    pub fn missing_dates(&self, range: &DateRange, frequency: Frequency) -> Result<Vec<DateToken>> {
        let present: BTreeSet<DateToken> =
            self.verified()?.iter().filter_map(LocalFile::date).collect();
        Ok(range
            .tokens(frequency)
            .into_iter()
            .filter(|token| !present.contains(token))
            .collect())
    }

    /// Records that `file` matched `digest`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the marker cannot be written.
    pub fn mark_verified(file: &LocalFile, digest: &str) -> Result<()> {
        write_marker(file, digest, VerificationState::Verified)
    }

    /// Records that `file` did not match `digest`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the marker cannot be written.
    pub fn mark_mismatched(file: &LocalFile, digest: &str) -> Result<()> {
        write_marker(file, digest, VerificationState::Mismatched)
    }

    /// Drops any recorded state for `file`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if an existing marker cannot be removed.
    pub fn forget(file: &LocalFile) -> Result<()> {
        match std::fs::remove_file(file.marker_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&file.marker_path(), e)),
        }
    }

    fn in_state(&self, state: VerificationState) -> Result<Vec<LocalFile>> {
        Ok(self
            .scan()?
            .into_iter()
            .filter(|file| Self::state_of(file) == state)
            .collect())
    }
}

fn collect_archives(dir: &Path, files: &mut Vec<LocalFile>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_error(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| io_error(dir, e))?.path();
        if path.is_dir() {
            collect_archives(&path, files)?;
        } else if path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(ARCHIVE_SUFFIX))
        {
            files.push(LocalFile::from_path(path)?);
        }
    }
    Ok(())
}

fn read_marker(path: &Path) -> Option<VerificationMarker> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

fn write_marker(file: &LocalFile, digest: &str, state: VerificationState) -> Result<()> {
    let marker = VerificationMarker {
        digest: digest.to_lowercase(),
        size: file.size(),
        modified: file.modified(),
        verified_at: Utc::now(),
        state,
    };
    let path = file.marker_path();
    let content = serde_json::to_string_pretty(&marker)?;
    std::fs::write(&path, content).map_err(|e| io_error(&path, e))
}

fn io_error(path: &Path, e: std::io::Error) -> KlineVaultError {
    KlineVaultError::Io(std::io::Error::new(
        e.kind(),
        format!("{}: {e}", path.display()),
    ))
}
