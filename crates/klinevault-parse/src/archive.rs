//! Single-entry zip extraction.
//!
//! The payload is read straight from the decompressing reader; callers that
//! stream it never hold the whole entry in memory.

use klinevault_types::{KlineVaultError, Result};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

/// The one payload file of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Entry name inside the archive.
    pub name: String,
    /// Decompressed content.
    pub data: Vec<u8>,
}

/// Extracts the single payload of the archive at `path` into memory.
///
/// # Errors
///
/// Returns [`KlineVaultError::MalformedArchive`] if the file is not a zip
/// archive or does not hold exactly one file entry, and an I/O error if it
/// cannot be opened.
pub fn read_single_entry(path: &Path) -> Result<ArchiveEntry> {
    with_single_entry(path, |name, reader| {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(ArchiveEntry {
            name: name.to_string(),
            data,
        })
    })
}

/// Opens the single payload of the archive at `path` and hands its
/// decompressing reader to `consume` together with the entry name.
///
/// I/O errors raised while `consume` reads the entry are reported as
/// [`KlineVaultError::MalformedArchive`].
///
/// # Errors
///
/// Returns [`KlineVaultError::MalformedArchive`] if the file is not a zip
/// archive or does not hold exactly one file entry, an I/O error if it
/// cannot be opened, and otherwise whatever `consume` returns.
pub fn with_single_entry<T>(
    path: &Path,
    consume: impl FnOnce(&str, &mut dyn Read) -> Result<T>,
) -> Result<T> {
    let file = File::open(path)?;
    let malformed = |reason: String| KlineVaultError::MalformedArchive {
        path: path.to_path_buf(),
        reason,
    };

    let mut archive =
        ZipArchive::new(BufReader::new(file)).map_err(|e| malformed(e.to_string()))?;
    let index = single_file_index(&mut archive).map_err(malformed)?;

    let mut entry = archive
        .by_index(index)
        .map_err(|e| malformed(e.to_string()))?;
    let name = entry.name().to_string();
    consume(&name, &mut entry).map_err(|e| match e {
        KlineVaultError::Io(e) => malformed(format!("{name}: {e}")),
        other => other,
    })
}

fn single_file_index<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> std::result::Result<usize, String> {
    let mut payload = None;
    for index in 0..archive.len() {
        let entry = archive.by_index(index).map_err(|e| e.to_string())?;
        if entry.is_dir() {
            continue;
        }
        if payload.replace(index).is_some() {
            return Err("more than one entry".to_string());
        }
    }
    payload.ok_or_else(|| "no entries".to_string())
}
