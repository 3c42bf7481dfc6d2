//! Batched, resumable mirroring of remote archives.

use klinevault_types::{
    KlineVaultError, PipelineConfig, RemoteFileRef, VERIFIED_SUFFIX, with_suffix,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{RemoteStore, Transfer, TransferItem};

/// Per-file result of a download run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The archive was already present. A missing sidecar may have been
    /// fetched for it.
    SkippedExisting,
    /// The archive is now present locally.
    Succeeded,
    /// Every attempt failed; carries the last reason.
    Failed(String),
}

/// Progress of one transfer attempt, reported before it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// Zero-based batch index.
    pub batch: usize,
    /// Number of batches in the run.
    pub batches: usize,
    /// Attempt number within the batch, starting at 1.
    pub attempt: u32,
    /// Files handed to the transfer in this attempt.
    pub pending: usize,
    /// Files confirmed present so far across the run.
    pub completed: usize,
    /// Files needing a transfer across the run.
    pub total: usize,
}

/// Summary of a download run.
#[derive(Debug, Clone, Default)]
pub struct DownloadReport {
    /// Outcome per unique reference, in input order.
    pub outcomes: Vec<(RemoteFileRef, DownloadOutcome)>,
    /// Number of batches dispatched.
    pub batches: usize,
    /// Number of calls made to the transfer.
    pub transfer_attempts: usize,
    /// Sidecars that could not be fetched (their archives stay unverifiable).
    pub sidecar_failures: usize,
}

impl DownloadReport {
    fn count(&self, predicate: impl Fn(&DownloadOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| predicate(o)).count()
    }

    /// Returns the number of archives skipped because they were present.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::SkippedExisting))
    }

    /// Returns the number of archives fetched in this run.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::Succeeded))
    }

    /// Returns the number of archives that could not be fetched.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::Failed(_)))
    }

    /// Returns one [`KlineVaultError::DownloadFailed`] per failed archive.
    #[must_use]
    pub fn errors(&self) -> Vec<KlineVaultError> {
        self.outcomes
            .iter()
            .filter_map(|(file, outcome)| match outcome {
                DownloadOutcome::Failed(reason) => Some(KlineVaultError::DownloadFailed {
                    key: file.key().to_string(),
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// One file of a batch and the reference it belongs to.
#[derive(Debug)]
struct WorkItem {
    owner: usize,
    sidecar: bool,
    item: TransferItem,
}

/// Mirrors archives and their sidecars under a local root.
#[derive(Clone)]
pub struct Downloader {
    store: Arc<dyn RemoteStore>,
    transfer: Arc<dyn Transfer>,
    root: PathBuf,
    batch_size: usize,
    max_tries: u32,
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("transfer", &self.transfer.name())
            .field("root", &self.root)
            .field("batch_size", &self.batch_size)
            .field("max_tries", &self.max_tries)
            .finish()
    }
}

impl Downloader {
    /// Default number of files per batch.
    pub const DEFAULT_BATCH_SIZE: usize = 4096;

    /// Default attempts per batch.
    pub const DEFAULT_MAX_TRIES: u32 = 3;

    /// Creates a downloader with default batching. Object URLs come from
    /// `store`.
    #[must_use]
    pub fn new(
        store: Arc<dyn RemoteStore>,
        transfer: Arc<dyn Transfer>,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            transfer,
            root: root.into(),
            batch_size: Self::DEFAULT_BATCH_SIZE,
            max_tries: Self::DEFAULT_MAX_TRIES,
        }
    }

    /// Creates a downloader from the pipeline configuration.
    #[must_use]
    pub fn from_pipeline(
        config: &PipelineConfig,
        store: Arc<dyn RemoteStore>,
        transfer: Arc<dyn Transfer>,
    ) -> Self {
        Self::new(store, transfer, config.data_root.clone())
            .with_batch_size(config.batch_size)
            .with_max_tries(config.max_tries)
    }

    /// Sets the maximum number of files per batch.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Sets the number of attempts per batch.
    #[must_use]
    pub fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = max_tries.max(1);
        self
    }

    /// Returns the local root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Downloads every reference; failures are reported, never raised.
    pub async fn download(&self, refs: &[RemoteFileRef]) -> DownloadReport {
        self.download_with_progress(refs, |_| {}).await
    }

    /// Downloads every reference, calling `on_attempt` before each transfer.
    pub async fn download_with_progress(
        &self,
        refs: &[RemoteFileRef],
        mut on_attempt: impl FnMut(&BatchProgress) + Send,
    ) -> DownloadReport {
        let mut seen = HashSet::new();
        let unique: Vec<&RemoteFileRef> = refs
            .iter()
            .filter(|r| seen.insert(r.key().to_string()))
            .collect();

        let mut outcomes: Vec<DownloadOutcome> = Vec::with_capacity(unique.len());
        let mut work: Vec<WorkItem> = Vec::new();
        for (owner, file) in unique.iter().enumerate() {
            let targets = [
                (false, file.key(), file.local_path(&self.root)),
                (true, file.checksum_key(), file.local_checksum_path(&self.root)),
            ];
            let mut archive_needed = false;
            for (sidecar, key, destination) in targets {
                if is_present(&destination).await {
                    continue;
                }
                if !sidecar {
                    archive_needed = true;
                    forget_marker(&destination).await;
                }
                work.push(WorkItem {
                    owner,
                    sidecar,
                    item: TransferItem::new(self.store.object_url(key), destination),
                });
            }
            outcomes.push(if archive_needed {
                DownloadOutcome::Succeeded
            } else {
                DownloadOutcome::SkippedExisting
            });
        }

        let batches = work.len().div_ceil(self.batch_size);
        let mut report = DownloadReport {
            batches,
            ..DownloadReport::default()
        };
        info!(
            event_type = "download_start",
            files = unique.len(),
            transfers = work.len(),
            batches = batches,
            backend = self.transfer.name(),
            "Starting download"
        );

        let total = work.len();
        let mut completed = 0;
        for (batch_index, batch) in work.chunks(self.batch_size).enumerate() {
            let mut pending: Vec<usize> = (0..batch.len()).collect();
            let mut reasons: Vec<String> = vec![String::new(); batch.len()];

            for attempt in 1..=self.max_tries {
                if pending.is_empty() {
                    break;
                }
                on_attempt(&BatchProgress {
                    batch: batch_index,
                    batches,
                    attempt,
                    pending: pending.len(),
                    completed,
                    total,
                });

                let items: Vec<TransferItem> =
                    pending.iter().map(|&i| batch[i].item.clone()).collect();
                let results = self.transfer.transfer(&items).await;
                report.transfer_attempts += 1;

                let mut still_missing = Vec::new();
                for (position, &i) in pending.iter().enumerate() {
                    let result = results
                        .get(position)
                        .cloned()
                        .unwrap_or_else(|| Err("no result from transfer".to_string()));
                    let failure = match result {
                        Ok(()) => {
                            if is_present(&batch[i].item.destination).await {
                                None
                            } else {
                                Some("missing after transfer".to_string())
                            }
                        }
                        Err(reason) => Some(reason),
                    };
                    match failure {
                        None => completed += 1,
                        Some(reason) => {
                            reasons[i] = reason;
                            still_missing.push(i);
                        }
                    }
                }

                if !still_missing.is_empty() && attempt < self.max_tries {
                    warn!(
                        event_type = "batch_retry",
                        batch = batch_index,
                        attempt = attempt,
                        missing = still_missing.len(),
                        "Retrying missing files"
                    );
                }
                pending = still_missing;
            }

            for i in pending {
                let work_item = &batch[i];
                let file = unique[work_item.owner];
                if work_item.sidecar {
                    report.sidecar_failures += 1;
                    warn!(
                        event_type = "sidecar_failed",
                        key = file.checksum_key(),
                        reason = %reasons[i],
                        "Checksum sidecar unavailable"
                    );
                } else {
                    warn!(
                        event_type = "download_failed",
                        key = file.key(),
                        reason = %reasons[i],
                        "Download failed"
                    );
                    outcomes[work_item.owner] = DownloadOutcome::Failed(reasons[i].clone());
                }
            }
            debug!(
                event_type = "batch_complete",
                batch = batch_index,
                completed = completed,
                "Batch complete"
            );
        }

        report.outcomes = unique.into_iter().cloned().zip(outcomes).collect();
        info!(
            event_type = "download_complete",
            skipped = report.skipped(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Download complete"
        );
        report
    }
}

/// Drops the verification marker of an archive about to be fetched again.
async fn forget_marker(archive: &Path) {
    let marker = with_suffix(archive, VERIFIED_SUFFIX);
    match tokio::fs::remove_file(&marker).await {
        Ok(()) => debug!(
            event_type = "marker_dropped",
            marker = %marker.display(),
            "Dropped marker of missing archive"
        ),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            event_type = "marker_drop_failed",
            marker = %marker.display(),
            error = %e,
            "Could not drop stale marker"
        ),
    }
}

/// A target counts as present when it is a non-empty regular file.
async fn is_present(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file() && meta.len() > 0)
}
