//! Multi-connection transfer mechanisms.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use klinevault_types::{
    KlineVaultError, PARTIAL_SUFFIX, PipelineConfig, Result, TransferBackend, with_suffix,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::HttpClient;

/// One file to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransferItem {
    /// Source URL.
    pub url: String,
    /// Final local path.
    pub destination: PathBuf,
}

impl TransferItem {
    /// Creates a transfer item.
    #[must_use]
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
        }
    }
}

/// Outcome of one item; the error carries a human-readable reason.
pub type TransferResult = std::result::Result<(), String>;

/// Moves a list of URLs to local files.
///
/// Implementations write to `<destination>.part` and rename on completion,
/// and return one result per item, in input order.
#[async_trait]
pub trait Transfer: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Fetches every item.
    async fn transfer(&self, items: &[TransferItem]) -> Vec<TransferResult>;
}

/// Built-in HTTP transfer with bounded concurrency.
#[derive(Debug, Clone)]
pub struct HttpTransfer {
    client: HttpClient,
    concurrency: usize,
}

impl HttpTransfer {
    /// Creates an HTTP transfer running at most `concurrency` requests at once.
    #[must_use]
    pub fn new(client: HttpClient, concurrency: usize) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
        }
    }
}

#[async_trait]
impl Transfer for HttpTransfer {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn transfer(&self, items: &[TransferItem]) -> Vec<TransferResult> {
        let futures: Vec<_> = items
            .iter()
            .map(|item| async move {
                self.client
                    .download_to(&item.url, &item.destination)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            })
            .collect();
        stream::iter(futures)
            .buffered(self.concurrency)
            .collect()
            .await
    }
}

/// Transfer delegated to an external `aria2c` process.
#[derive(Debug, Clone)]
pub struct Aria2Transfer {
    binary: PathBuf,
    concurrency: usize,
    connections_per_server: usize,
    proxy: Option<String>,
}

impl Aria2Transfer {
    /// Creates an aria2 transfer using the given executable.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>, concurrency: usize, proxy: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            concurrency: concurrency.max(1),
            connections_per_server: 4,
            proxy,
        }
    }

    /// Locates `aria2c` on `PATH`.
    #[must_use]
    pub fn locate() -> Option<PathBuf> {
        which::which("aria2c").ok()
    }

    /// Renders the aria2 input file: one URL per item with its target
    /// directory and `.part` output name.
    fn input_file(items: &[TransferItem]) -> String {
        let mut input = String::new();
        for item in items {
            let dir = item
                .destination
                .parent()
                .map_or_else(|| ".".to_string(), |p| p.display().to_string());
            let out = partial_path(&item.destination);
            let out = out
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            input.push_str(&format!("{}\n  dir={dir}\n  out={out}\n", item.url));
        }
        input
    }

    async fn run(&self, items: &[TransferItem]) -> Result<()> {
        for item in items {
            if let Some(parent) = item.destination.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            // Leftovers of an interrupted run must not be promoted later.
            let partial = partial_path(&item.destination);
            if tokio::fs::try_exists(&partial).await.unwrap_or(false) {
                tokio::fs::remove_file(&partial).await?;
            }
        }

        let mut input = tempfile::NamedTempFile::new()?;
        input.write_all(Self::input_file(items).as_bytes())?;
        input.flush()?;

        let mut command = tokio::process::Command::new(&self.binary);
        command
            .arg("-i")
            .arg(input.path())
            .arg(format!("-j{}", self.concurrency))
            .arg(format!("-x{}", self.connections_per_server))
            .arg("-q")
            .arg("--allow-overwrite=true")
            .arg("--auto-file-renaming=false")
            .kill_on_drop(true);
        if let Some(proxy) = &self.proxy {
            command.arg(format!("--all-proxy={proxy}"));
        }

        let status = command.status().await?;
        if !status.success() {
            // aria2c exits non-zero when any item fails; per-item state is
            // read back from the filesystem.
            debug!(
                event_type = "aria2_exit",
                code = ?status.code(),
                "aria2c reported failures"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Transfer for Aria2Transfer {
    fn name(&self) -> &'static str {
        "aria2"
    }

    async fn transfer(&self, items: &[TransferItem]) -> Vec<TransferResult> {
        if let Err(e) = self.run(items).await {
            warn!(event_type = "aria2_failed", error = %e, "aria2c could not run");
            return items.iter().map(|_| Err(e.to_string())).collect();
        }

        let mut results = Vec::with_capacity(items.len());
        for item in items {
            results.push(finish_partial(&item.destination).await);
        }
        results
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    with_suffix(destination, PARTIAL_SUFFIX)
}

/// Promotes a completed `.part` file to its final name.
///
/// aria2 keeps a `<file>.aria2` control file next to unfinished downloads.
async fn finish_partial(destination: &Path) -> TransferResult {
    let partial = partial_path(destination);
    let control = with_suffix(&partial, ".aria2");
    if tokio::fs::try_exists(&control).await.unwrap_or(false) {
        return Err("transfer incomplete".to_string());
    }
    match tokio::fs::metadata(&partial).await {
        Ok(meta) if meta.len() > 0 => tokio::fs::rename(&partial, destination)
            .await
            .map_err(|e| e.to_string()),
        Ok(_) => Err("empty transfer".to_string()),
        Err(_) => Err("not downloaded".to_string()),
    }
}

/// Picks the transfer mechanism configured for the pipeline.
///
/// `Auto` uses `aria2c` when it is on `PATH` and falls back to HTTP.
///
/// # Errors
///
/// Returns [`KlineVaultError::Config`] if `aria2` is requested but not
/// installed, or the HTTP client cannot be built.
pub fn auto_transfer(config: &PipelineConfig) -> Result<Arc<dyn Transfer>> {
    let aria2 = || {
        Aria2Transfer::locate().map(|binary| {
            Aria2Transfer::new(binary, config.transfer_concurrency, config.proxy.clone())
        })
    };
    let http = || -> Result<Arc<dyn Transfer>> {
        Ok(Arc::new(HttpTransfer::new(
            HttpClient::from_pipeline(config)?,
            config.transfer_concurrency,
        )))
    };

    let transfer: Arc<dyn Transfer> = match config.transfer {
        TransferBackend::Http => http()?,
        TransferBackend::Aria2 => Arc::new(aria2().ok_or_else(|| {
            KlineVaultError::Config("aria2c was requested but is not on PATH".to_string())
        })?),
        TransferBackend::Auto => match aria2() {
            Some(aria2) => Arc::new(aria2),
            None => http()?,
        },
    };
    info!(
        event_type = "transfer_selected",
        backend = transfer.name(),
        "Selected transfer backend"
    );
    Ok(transfer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aria2_input_file() {
        let items = vec![
            TransferItem::new(
                "https://data.binance.vision/data/a/BTCUSDT-1m-2023-01-01.zip",
                "/vault/data/a/BTCUSDT-1m-2023-01-01.zip",
            ),
            TransferItem::new(
                "https://data.binance.vision/data/a/BTCUSDT-1m-2023-01-01.zip.CHECKSUM",
                "/vault/data/a/BTCUSDT-1m-2023-01-01.zip.CHECKSUM",
            ),
        ];
        let input = Aria2Transfer::input_file(&items);
        assert_eq!(
            input,
            "https://data.binance.vision/data/a/BTCUSDT-1m-2023-01-01.zip\n  dir=/vault/data/a\n  out=BTCUSDT-1m-2023-01-01.zip.part\n\
             https://data.binance.vision/data/a/BTCUSDT-1m-2023-01-01.zip.CHECKSUM\n  dir=/vault/data/a\n  out=BTCUSDT-1m-2023-01-01.zip.CHECKSUM.part\n"
        );
    }

    #[tokio::test]
    async fn test_finish_partial() {
        let dir = tempfile::tempdir().unwrap();
        let done = dir.path().join("done.zip");
        std::fs::write(partial_path(&done), b"zip").unwrap();
        assert!(finish_partial(&done).await.is_ok());
        assert!(done.exists());

        let unfinished = dir.path().join("unfinished.zip");
        let partial = partial_path(&unfinished);
        std::fs::write(&partial, b"zi").unwrap();
        std::fs::write(with_suffix(&partial, ".aria2"), b"ctl").unwrap();
        assert!(finish_partial(&unfinished).await.is_err());
        assert!(!unfinished.exists());

        assert!(finish_partial(&dir.path().join("missing.zip")).await.is_err());
    }

    #[test]
    fn test_http_backend_selected() {
        let config = PipelineConfig {
            transfer: TransferBackend::Http,
            ..PipelineConfig::default()
        };
        let transfer = auto_transfer(&config).unwrap();
        assert_eq!(transfer.name(), "http");
    }

    #[tokio::test]
    async fn test_aria2_missing_binary_fails_every_item() {
        let transfer = Aria2Transfer::new("/nonexistent/aria2c", 4, None);
        let dir = tempfile::tempdir().unwrap();
        let items = vec![
            TransferItem::new("https://example.invalid/a.zip", dir.path().join("a.zip")),
            TransferItem::new("https://example.invalid/b.zip", dir.path().join("b.zip")),
        ];
        let results = transfer.transfer(&items).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_err()));
    }

    /// Returns false once `pid` has exited, including as an unreaped zombie.
    #[cfg(target_os = "linux")]
    fn running(pid: &str) -> bool {
        std::fs::read_to_string(format!("/proc/{pid}/stat")).is_ok_and(|stat| {
            stat.rsplit_once(')')
                .and_then(|(_, rest)| rest.trim_start().chars().next())
                .is_some_and(|state| !matches!(state, 'Z' | 'X'))
        })
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_cancelled_transfer_kills_aria2() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("aria2c.pid");
        let binary = dir.path().join("aria2c");
        std::fs::write(
            &binary,
            format!("#!/bin/sh\necho $$ > '{}'\nexec sleep 30\n", pid_file.display()),
        )
        .unwrap();
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();

        let transfer = Aria2Transfer::new(&binary, 1, None);
        let items = vec![TransferItem::new(
            "https://example.invalid/a.zip",
            dir.path().join("a.zip"),
        )];
        let pid = {
            let run = transfer.transfer(&items);
            tokio::pin!(run);
            loop {
                tokio::select! {
                    _ = &mut run => panic!("aria2c stand-in exited on its own"),
                    () = tokio::time::sleep(Duration::from_millis(20)) => {
                        if let Ok(pid) = std::fs::read_to_string(&pid_file)
                            && !pid.trim().is_empty()
                        {
                            break pid.trim().to_string();
                        }
                    }
                }
            }
        };

        let mut alive = true;
        for _ in 0..250 {
            alive = running(&pid);
            if !alive {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!alive, "aria2c {pid} outlived the cancelled transfer");
    }
}
