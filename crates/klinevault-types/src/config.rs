//! Pipeline configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{KlineVaultError, Result};

/// Public download prefix of Binance Vision; object URL = prefix + key.
pub const DEFAULT_BASE_URL: &str = "https://data.binance.vision/";

/// S3 bucket endpoint serving `ListBucketResult` listings.
pub const DEFAULT_LISTING_URL: &str = "https://s3-ap-northeast-1.amazonaws.com/data.binance.vision";

/// What to do with a data file whose digest does not match its sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    /// Leave the file in place and report it.
    #[default]
    Flag,
    /// Remove the file (and its marker) so the next download fetches it again.
    Delete,
}

/// Transfer mechanism used by the downloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransferBackend {
    /// `aria2c` when it is on `PATH`, the built-in HTTP transfer otherwise.
    #[default]
    Auto,
    /// Built-in HTTP transfer.
    Http,
    /// External `aria2c` process.
    Aria2,
}

impl std::str::FromStr for TransferBackend {
    type Err = KlineVaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "http" => Ok(Self::Http),
            "aria2" | "aria2c" => Ok(Self::Aria2),
            _ => Err(KlineVaultError::Config(format!(
                "unknown transfer backend '{s}', expected auto, http or aria2"
            ))),
        }
    }
}

/// Immutable settings shared by every pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Local root the remote key hierarchy is mirrored under.
    pub data_root: PathBuf,
    /// Download prefix for objects.
    pub base_url: String,
    /// Listing endpoint of the bucket.
    pub listing_url: String,
    /// Optional HTTP(S) proxy for every request.
    pub proxy: Option<String>,
    /// Maximum number of files per download batch.
    pub batch_size: usize,
    /// Attempts per batch before remaining files are reported failed.
    pub max_tries: u32,
    /// Concurrent per-symbol listing requests.
    pub list_concurrency: usize,
    /// Concurrent transfers inside a batch.
    pub transfer_concurrency: usize,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Mismatch handling during verification.
    pub mismatch_policy: MismatchPolicy,
    /// Transfer mechanism.
    pub transfer: TransferBackend,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_root: Self::default_data_root(),
            base_url: DEFAULT_BASE_URL.to_string(),
            listing_url: DEFAULT_LISTING_URL.to_string(),
            proxy: None,
            batch_size: 4096,
            max_tries: 3,
            list_concurrency: 8,
            transfer_concurrency: 20,
            request_timeout_secs: 60,
            mismatch_policy: MismatchPolicy::Flag,
            transfer: TransferBackend::Auto,
        }
    }
}

impl PipelineConfig {
    /// Returns the default data root.
    ///
    /// - Linux: `~/.local/share/klinevault/`
    /// - macOS: `~/Library/Application Support/klinevault/`
    /// - Windows: `C:\Users\<User>\AppData\Roaming\klinevault\`
    ///
    /// Falls back to `~/.klinevault/`.
    #[must_use]
    pub fn default_data_root() -> PathBuf {
        ProjectDirs::from("", "", "klinevault").map_or_else(dirs_fallback, |proj_dirs| {
            proj_dirs.data_dir().to_path_buf()
        })
    }

    /// Parses a TOML document; missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`KlineVaultError::Config`] on malformed TOML or invalid values.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| KlineVaultError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`KlineVaultError::Config`] if the file cannot be read or parsed.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            KlineVaultError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Rejects settings no stage can run with.
    ///
    /// # Errors
    ///
    /// Returns [`KlineVaultError::Config`] naming the offending setting.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            (self.batch_size == 0, "batch_size must be at least 1"),
            (self.max_tries == 0, "max_tries must be at least 1"),
            (self.list_concurrency == 0, "list_concurrency must be at least 1"),
            (self.transfer_concurrency == 0, "transfer_concurrency must be at least 1"),
            (self.request_timeout_secs == 0, "request_timeout_secs must be at least 1"),
            (self.base_url.is_empty(), "base_url must not be empty"),
            (self.listing_url.is_empty(), "listing_url must not be empty"),
        ];
        match checks.into_iter().find(|(failed, _)| *failed) {
            Some((_, message)) => Err(KlineVaultError::Config(message.to_string())),
            None => Ok(()),
        }
    }

    /// Creates the data root if needed.
    ///
    /// # Errors
    ///
    /// Returns [`KlineVaultError::Config`] if the root cannot be created or is
    /// not a directory.
    pub fn ensure_data_root(&self) -> Result<&Path> {
        std::fs::create_dir_all(&self.data_root).map_err(|e| {
            KlineVaultError::Config(format!(
                "unusable data root {}: {e}",
                self.data_root.display()
            ))
        })?;
        Ok(&self.data_root)
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Returns the directory parsed exports are written under.
    #[must_use]
    pub fn parsed_root(&self) -> PathBuf {
        self.data_root.join("parsed")
    }
}

/// Fallback for determining home directory.
fn dirs_fallback() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".klinevault")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.batch_size, 4096);
        assert_eq!(config.max_tries, 3);
        assert_eq!(config.list_concurrency, 8);
        assert_eq!(config.transfer_concurrency, 20);
        assert_eq!(config.mismatch_policy, MismatchPolicy::Flag);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = PipelineConfig::from_toml_str(
            r#"
            data_root = "/srv/binance"
            batch_size = 100
            mismatch_policy = "delete"
            transfer = "http"
            proxy = "http://127.0.0.1:7890"
            "#,
        )
        .unwrap();

        assert_eq!(config.data_root, PathBuf::from("/srv/binance"));
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.max_tries, 3);
        assert_eq!(config.mismatch_policy, MismatchPolicy::Delete);
        assert_eq!(config.transfer, TransferBackend::Http);
        assert_eq!(config.proxy.as_deref(), Some("http://127.0.0.1:7890"));
    }

    #[test]
    fn test_validate_rejects_zero() {
        let err = PipelineConfig::from_toml_str("batch_size = 0").unwrap_err();
        assert!(matches!(err, KlineVaultError::Config(_)));

        let config = PipelineConfig {
            list_concurrency: 0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml() {
        assert!(PipelineConfig::from_toml_str("batch_size = \"many\"").is_err());
    }

    #[test]
    fn test_from_file_and_ensure_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("vault");
        let path = dir.path().join("klinevault.toml");
        std::fs::write(&path, format!("data_root = {:?}\n", root.display().to_string())).unwrap();

        let config = PipelineConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.ensure_data_root().unwrap(), root.as_path());
        assert!(root.is_dir());
    }
}
