//! S3 `ListBucketResult` decoding.

use klinevault_types::{KlineVaultError, Result};
use serde::Deserialize;

/// One object entry of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObjectEntry {
    /// Full object key.
    #[serde(rename = "Key")]
    pub key: String,
    /// Object size in bytes.
    #[serde(rename = "Size", default)]
    pub size: u64,
    /// Last modification time as reported by the store.
    #[serde(rename = "LastModified", default)]
    pub last_modified: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommonPrefix {
    #[serde(rename = "Prefix")]
    prefix: String,
}

#[derive(Debug, Default, Deserialize)]
struct S3Error {
    #[serde(rename = "Code", default)]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ListBucketResult {
    #[serde(rename = "IsTruncated", default)]
    is_truncated: bool,
    #[serde(rename = "NextMarker", default)]
    next_marker: Option<String>,
    #[serde(rename = "CommonPrefixes", default)]
    common_prefixes: Vec<CommonPrefix>,
    #[serde(rename = "Contents", default)]
    contents: Vec<ObjectEntry>,
}

/// One page of a delimited listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Immediate child directories, as full prefixes ending in `/`.
    pub directories: Vec<String>,
    /// Objects directly under the prefix.
    pub objects: Vec<ObjectEntry>,
    /// Marker for the next page, `None` when this is the last page.
    pub next_marker: Option<String>,
}

impl ListPage {
    /// Decodes a `ListBucketResult` document.
    ///
    /// When a truncated page carries no `NextMarker`, the last key or prefix
    /// of the page is used instead.
    ///
    /// # Errors
    ///
    /// Returns [`KlineVaultError::RemoteUnavailable`] if the document is not a
    /// bucket listing.
    pub fn from_xml(xml: &str) -> Result<Self> {
        if xml.contains("<Error>") {
            let error: S3Error = quick_xml::de::from_str(xml).unwrap_or_default();
            return Err(KlineVaultError::RemoteUnavailable(format!(
                "bucket listing refused: {} {}",
                error.code, error.message
            )));
        }
        let result: ListBucketResult = quick_xml::de::from_str(xml).map_err(|e| {
            KlineVaultError::RemoteUnavailable(format!("malformed bucket listing: {e}"))
        })?;

        let directories: Vec<String> = result
            .common_prefixes
            .into_iter()
            .map(|p| p.prefix)
            .collect();
        let objects = result.contents;

        let next_marker = if result.is_truncated {
            let fallback = || {
                let last_key = objects.last().map(|o| o.key.clone());
                let last_dir = directories.last().cloned();
                last_key.max(last_dir)
            };
            let marker = result
                .next_marker
                .filter(|m| !m.is_empty())
                .or_else(fallback);
            if marker.is_none() {
                return Err(KlineVaultError::RemoteUnavailable(
                    "truncated bucket listing without a continuation marker".to_string(),
                ));
            }
            marker
        } else {
            None
        };

        Ok(Self {
            directories,
            objects,
            next_marker,
        })
    }
}

/// A complete listing of one prefix, all pages merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirListing {
    /// Immediate child directories, as full prefixes ending in `/`.
    pub directories: Vec<String>,
    /// Objects directly under the prefix.
    pub objects: Vec<ObjectEntry>,
}

impl DirListing {
    /// Appends a page.
    pub fn extend(&mut self, page: ListPage) {
        self.directories.extend(page.directories);
        self.objects.extend(page.objects);
    }

    /// Returns the last path component of each child directory.
    #[must_use]
    pub fn directory_names(&self) -> Vec<&str> {
        self.directories
            .iter()
            .filter_map(|prefix| prefix.trim_end_matches('/').rsplit('/').next())
            .filter(|name| !name.is_empty())
            .collect()
    }
}
