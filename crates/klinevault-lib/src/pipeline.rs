//! List, download, verify and parse as one restartable run.
//!
//! Each stage derives its work from the local data root: downloads skip
//! archives already present, verification only looks at archives without a
//! valid marker, and parsing only reads verified archives. Interrupting a run
//! at any point and starting it again converges to the same end state.

use klinevault_fetch::{
    BatchListing, BatchProgress, DownloadReport, Downloader, Lister, RemoteStore, S3Store,
    Transfer, auto_transfer,
};
use klinevault_format::{OutputFormat, write_klines, write_metrics};
use klinevault_parse::{ArchiveParser, ParsedTable, parse_many, parser_for};
use klinevault_types::{
    DateRange, KlineVaultError, LocalFile, PARTIAL_SUFFIX, PathBuilder, PipelineConfig,
    RemoteFileRef, Result, Symbol, key_to_path, with_suffix,
};
use klinevault_verify::{ChecksumVerifier, FileStateTracker, VerificationReport};
use rayon::prelude::*;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Parsed tables of one parse run, in archive order.
#[derive(Debug, Default)]
pub struct ParseReport {
    /// Archive path and its table or error.
    pub tables: Vec<(PathBuf, Result<ParsedTable>)>,
}

impl ParseReport {
    /// Returns the number of archives parsed successfully.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.tables.iter().filter(|(_, t)| t.is_ok()).count()
    }

    /// Returns the number of archives that failed to parse.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.tables.len() - self.succeeded()
    }

    /// Returns the total number of parsed rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.tables
            .iter()
            .filter_map(|(_, t)| t.as_ref().ok())
            .map(ParsedTable::len)
            .sum()
    }
}

/// Result of exporting one verified archive.
#[derive(Debug)]
pub struct ExportOutcome {
    /// The source archive.
    pub archive: PathBuf,
    /// The written file, or why nothing was written.
    pub result: Result<PathBuf>,
}

/// Local verification state of one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolStatus {
    /// The symbol.
    pub symbol: Symbol,
    /// Archives whose digest matched.
    pub verified: usize,
    /// Archives not yet checked.
    pub unverified: usize,
    /// Archives whose digest did not match.
    pub mismatched: usize,
    /// Date tokens of the requested range without a verified archive.
    pub missing: Option<usize>,
}

/// Summary of a full pipeline run.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Symbols the run was asked about.
    pub symbols: Vec<Symbol>,
    /// Symbols skipped because every date of the range was already verified.
    pub complete: Vec<Symbol>,
    /// Listing of the remaining symbols.
    pub listing: BatchListing,
    /// Download stage summary.
    pub download: DownloadReport,
    /// Verification of previously unverified archives.
    pub verification: Vec<VerificationReport>,
    /// Exports, when an output format was requested.
    pub exports: Vec<ExportOutcome>,
}

impl SyncReport {
    /// Returns the number of archives verified in this run.
    #[must_use]
    pub fn verified(&self) -> usize {
        self.verification
            .iter()
            .filter(|r| r.outcome.is_verified())
            .count()
    }

    /// Returns every per-unit error of the run.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        let listing = self
            .listing
            .errors
            .iter()
            .map(|(symbol, e)| format!("{symbol}: {e}"));
        let download = self.download.errors().into_iter().map(|e| e.to_string());
        let verification = self
            .verification
            .iter()
            .filter_map(VerificationReport::error)
            .map(|e| e.to_string());
        let exports = self
            .exports
            .iter()
            .filter_map(|o| o.result.as_ref().err())
            .map(ToString::to_string);
        listing
            .chain(download)
            .chain(verification)
            .chain(exports)
            .collect()
    }
}

/// The list -> download -> verify -> parse pipeline for one key layout.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    builder: PathBuilder,
    store: Arc<dyn RemoteStore>,
    transfer: Arc<dyn Transfer>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("builder", &self.builder)
            .field("transfer", &self.transfer.name())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Creates a pipeline over explicit collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`KlineVaultError::Config`] if the configuration is invalid.
    pub fn new(
        config: PipelineConfig,
        builder: PathBuilder,
        store: Arc<dyn RemoteStore>,
        transfer: Arc<dyn Transfer>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            builder,
            store,
            transfer,
        })
    }

    /// Creates a pipeline against the public bucket with the configured
    /// transfer backend.
    ///
    /// # Errors
    ///
    /// Returns [`KlineVaultError::Config`] if the configuration is invalid or
    /// the configured transfer backend is unavailable.
    pub fn from_config(config: PipelineConfig, builder: PathBuilder) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(S3Store::from_pipeline(&config)?);
        let transfer = auto_transfer(&config)?;
        Self::new(config, builder, store, transfer)
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns the key layout.
    #[must_use]
    pub const fn builder(&self) -> &PathBuilder {
        &self.builder
    }

    /// Returns a lister for this layout.
    #[must_use]
    pub fn lister(&self) -> Lister {
        Lister::new(
            self.store.clone(),
            self.builder,
            self.config.list_concurrency,
        )
    }

    /// Returns a downloader into the data root.
    #[must_use]
    pub fn downloader(&self) -> Downloader {
        Downloader::from_pipeline(&self.config, self.store.clone(), self.transfer.clone())
    }

    /// Returns the checksum verifier.
    #[must_use]
    pub fn verifier(&self) -> ChecksumVerifier {
        ChecksumVerifier::from_pipeline(&self.config)
    }

    /// Returns the state tracker of one symbol.
    #[must_use]
    pub fn tracker(&self, symbol: &Symbol) -> FileStateTracker {
        FileStateTracker::for_symbol(&self.config.data_root, &self.builder, symbol)
    }

    /// Lists the symbols that have a local directory for this layout.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the layout directory exists but cannot be read.
    pub fn local_symbols(&self) -> Result<Vec<Symbol>> {
        let dir = key_to_path(&self.config.data_root, &self.builder.root_prefix());
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut symbols = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir()
                && let Some(name) = entry.file_name().to_str()
            {
                symbols.push(Symbol::from(name));
            }
        }
        symbols.sort();
        Ok(symbols)
    }

    /// Returns `requested`, or every remote symbol when it is empty.
    ///
    /// # Errors
    ///
    /// Returns [`KlineVaultError::RemoteUnavailable`] if symbols have to be
    /// listed and the listing fails.
    pub async fn resolve_symbols(&self, requested: &[Symbol]) -> Result<Vec<Symbol>> {
        if requested.is_empty() {
            self.lister().list_symbols().await
        } else {
            Ok(requested.to_vec())
        }
    }

    /// Lists archives of `symbols`, optionally restricted to a date range.
    pub async fn list(&self, symbols: &[Symbol], range: Option<&DateRange>) -> BatchListing {
        let lister = self.lister();
        match range {
            Some(range) => lister.list_files_batch_in_range(symbols, range).await,
            None => lister.list_files_batch(symbols).await,
        }
    }

    /// Mirrors archives and sidecars under the data root.
    ///
    /// # Errors
    ///
    /// Returns [`KlineVaultError::Config`] if the data root is unusable.
    /// Per-file failures are reported in the [`DownloadReport`].
    pub async fn download(
        &self,
        refs: &[RemoteFileRef],
        on_attempt: impl FnMut(&BatchProgress) + Send,
    ) -> Result<DownloadReport> {
        self.config.ensure_data_root()?;
        Ok(self
            .downloader()
            .download_with_progress(refs, on_attempt)
            .await)
    }

    /// Verifies every unverified archive of `symbols` in parallel.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a symbol directory cannot be scanned.
    pub async fn verify(&self, symbols: &[Symbol]) -> Result<Vec<VerificationReport>> {
        let this = self.clone();
        let symbols = symbols.to_vec();
        blocking(move || {
            let mut files = Vec::new();
            for symbol in &symbols {
                files.extend(this.tracker(symbol).unverified()?);
            }
            Ok(this.verifier().verify(&files))
        })
        .await
    }

    /// Parses the verified archives of `symbols` in parallel.
    ///
    /// # Errors
    ///
    /// Returns [`KlineVaultError::InvalidSchema`] if the layout's data kind
    /// has no parser, or an I/O error if a directory cannot be scanned.
    /// Per-archive failures are kept in the [`ParseReport`].
    pub async fn parse(&self, symbols: &[Symbol], range: Option<&DateRange>) -> Result<ParseReport> {
        let this = self.clone();
        let symbols = symbols.to_vec();
        let range = range.copied();
        blocking(move || {
            let parser = parser_for(this.builder.kind())?;
            let paths = this.verified_paths(&symbols, range.as_ref())?;
            Ok(ParseReport {
                tables: parse_many(parser.as_ref(), &paths),
            })
        })
        .await
    }

    /// Parses the verified archives of `symbols` and writes each table next
    /// to its mirror under the parsed root. Existing exports are kept.
    ///
    /// # Errors
    ///
    /// Returns [`KlineVaultError::InvalidSchema`] if the layout's data kind
    /// has no parser, or an I/O error if a directory cannot be scanned.
    pub async fn export(
        &self,
        symbols: &[Symbol],
        range: Option<&DateRange>,
        format: OutputFormat,
    ) -> Result<Vec<ExportOutcome>> {
        let this = self.clone();
        let symbols = symbols.to_vec();
        let range = range.copied();
        blocking(move || {
            let parser = parser_for(this.builder.kind())?;
            let paths = this.verified_paths(&symbols, range.as_ref())?;
            let outcomes: Vec<ExportOutcome> = paths
                .par_iter()
                .map(|archive| ExportOutcome {
                    archive: archive.clone(),
                    result: this.export_archive(parser.as_ref(), archive, format),
                })
                .collect();
            info!(
                event_type = "export_complete",
                format = %format,
                files = outcomes.len(),
                failed = outcomes.iter().filter(|o| o.result.is_err()).count(),
                "Export complete"
            );
            Ok(outcomes)
        })
        .await
    }

    /// Returns where the export of `archive` is written.
    #[must_use]
    pub fn export_path(&self, archive: &Path, format: OutputFormat) -> PathBuf {
        let relative = archive
            .strip_prefix(&self.config.data_root)
            .unwrap_or_else(|_| Path::new(archive.file_name().unwrap_or_default()));
        self.config
            .parsed_root()
            .join(relative)
            .with_extension(format.extension())
    }

    /// Summarises local verification state per symbol.
    ///
    /// With an empty `symbols`, every symbol with a local directory is
    /// reported. With a range, the number of missing date tokens is included.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a directory cannot be scanned.
    pub async fn status(
        &self,
        symbols: &[Symbol],
        range: Option<&DateRange>,
    ) -> Result<Vec<SymbolStatus>> {
        let this = self.clone();
        let symbols = symbols.to_vec();
        let range = range.copied();
        blocking(move || {
            let symbols = if symbols.is_empty() {
                this.local_symbols()?
            } else {
                symbols
            };
            symbols
                .into_iter()
                .map(|symbol| -> Result<SymbolStatus> {
                    let tracker = this.tracker(&symbol);
                    let missing = range
                        .map(|r| tracker.missing_dates(&r, this.builder.frequency()))
                        .transpose()?
                        .map(|dates| dates.len());
                    Ok(SymbolStatus {
                        verified: tracker.verified()?.len(),
                        unverified: tracker.unverified()?.len(),
                        mismatched: tracker.mismatched()?.len(),
                        missing,
                        symbol,
                    })
                })
                .collect()
        })
        .await
    }

    /// Runs every stage for `symbols` (every remote symbol when empty).
    ///
    /// With a range, symbols whose range is already fully verified are not
    /// listed or downloaded again.
    ///
    /// # Errors
    ///
    /// Only configuration-level failures abort the run: an unusable data
    /// root, a data kind without a parser, or a failed symbol discovery.
    pub async fn sync(
        &self,
        symbols: &[Symbol],
        range: Option<&DateRange>,
        export: Option<OutputFormat>,
    ) -> Result<SyncReport> {
        self.sync_with_progress(symbols, range, export, |_| {}).await
    }

    /// [`Pipeline::sync`] with a download progress callback.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::sync`].
    pub async fn sync_with_progress(
        &self,
        symbols: &[Symbol],
        range: Option<&DateRange>,
        export: Option<OutputFormat>,
        on_attempt: impl FnMut(&BatchProgress) + Send,
    ) -> Result<SyncReport> {
        self.config.ensure_data_root()?;
        if export.is_some() {
            parser_for(self.builder.kind())?;
        }

        let symbols = self.resolve_symbols(symbols).await?;
        let (complete, pending) = self.partition_complete(&symbols, range).await?;

        let listing = self.list(&pending, range).await;
        let refs: Vec<RemoteFileRef> = listing.files.values().flatten().cloned().collect();
        info!(
            event_type = "sync_listed",
            symbols = pending.len(),
            complete = complete.len(),
            files = refs.len(),
            "Listing complete"
        );

        let download = self.download(&refs, on_attempt).await?;
        let verification = self.verify(&pending).await?;
        let exports = match export {
            Some(format) => self.export(&pending, range, format).await?,
            None => Vec::new(),
        };

        let report = SyncReport {
            symbols,
            complete,
            listing,
            download,
            verification,
            exports,
        };
        info!(
            event_type = "sync_complete",
            verified = report.verified(),
            errors = report.errors().len(),
            "Sync complete"
        );
        Ok(report)
    }

    async fn partition_complete(
        &self,
        symbols: &[Symbol],
        range: Option<&DateRange>,
    ) -> Result<(Vec<Symbol>, Vec<Symbol>)> {
        let Some(range) = range.copied() else {
            return Ok((Vec::new(), symbols.to_vec()));
        };
        let this = self.clone();
        let symbols = symbols.to_vec();
        blocking(move || {
            let mut complete = Vec::new();
            let mut pending = Vec::new();
            for symbol in symbols {
                let missing = this
                    .tracker(&symbol)
                    .missing_dates(&range, this.builder.frequency())?;
                if missing.is_empty() {
                    complete.push(symbol);
                } else {
                    pending.push(symbol);
                }
            }
            Ok((complete, pending))
        })
        .await
    }

    fn verified_paths(&self, symbols: &[Symbol], range: Option<&DateRange>) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for symbol in symbols {
            let tracker = self.tracker(symbol);
            let files = match range {
                Some(range) => tracker.verified_in_range(range)?,
                None => tracker.verified()?,
            };
            paths.extend(files.iter().map(|f: &LocalFile| f.path().to_path_buf()));
        }
        Ok(paths)
    }

    fn export_archive(
        &self,
        parser: &dyn ArchiveParser,
        archive: &Path,
        format: OutputFormat,
    ) -> Result<PathBuf> {
        let output = self.export_path(archive, format);
        if output.exists() {
            return Ok(output);
        }
        let table = parser.parse(archive)?;

        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let partial = with_suffix(&output, PARTIAL_SUFFIX);
        let writer = BufWriter::new(File::create(&partial)?);
        let written = match &table {
            ParsedTable::Klines(rows) => write_klines(format, rows, writer),
            ParsedTable::Metrics(rows) => write_metrics(format, rows, writer),
        };
        if let Err(e) = written {
            warn!(
                event_type = "export_failed",
                file = %output.display(),
                error = %e,
                "Export failed"
            );
            let _ = std::fs::remove_file(&partial);
            return Err(KlineVaultError::Export {
                path: output,
                reason: e.to_string(),
            });
        }
        std::fs::rename(&partial, &output)?;
        Ok(output)
    }
}

async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| KlineVaultError::Io(std::io::Error::other(e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use klinevault_fetch::{ListPage, TransferItem, TransferResult};
    use klinevault_types::{DataKind, Frequency, KlineInterval, MarketSegment};

    #[derive(Debug)]
    struct EmptyStore;

    #[async_trait::async_trait]
    impl RemoteStore for EmptyStore {
        async fn list_page(&self, _prefix: &str, _marker: Option<&str>) -> Result<ListPage> {
            Ok(ListPage::default())
        }

        fn object_url(&self, key: &str) -> String {
            key.to_string()
        }
    }

    #[derive(Debug)]
    struct NoTransfer;

    #[async_trait::async_trait]
    impl Transfer for NoTransfer {
        fn name(&self) -> &'static str {
            "none"
        }

        async fn transfer(&self, items: &[TransferItem]) -> Vec<TransferResult> {
            items.iter().map(|_| Err("offline".to_string())).collect()
        }
    }

    fn pipeline(root: &Path, kind: DataKind, interval: Option<KlineInterval>) -> Pipeline {
        let config = PipelineConfig {
            data_root: root.to_path_buf(),
            ..PipelineConfig::default()
        };
        let builder = PathBuilder::new(MarketSegment::UmFutures, kind, Frequency::Daily, interval)
            .unwrap();
        Pipeline::new(config, builder, Arc::new(EmptyStore), Arc::new(NoTransfer)).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PipelineConfig {
            batch_size: 0,
            ..PipelineConfig::default()
        };
        let builder = PathBuilder::new(
            MarketSegment::Spot,
            DataKind::Klines,
            Frequency::Daily,
            Some(KlineInterval::Minute1),
        )
        .unwrap();
        let result = Pipeline::new(config, builder, Arc::new(EmptyStore), Arc::new(NoTransfer));
        assert!(matches!(result, Err(KlineVaultError::Config(_))));
    }

    #[test]
    fn test_export_path_mirrors_layout() {
        let pipeline = pipeline(
            Path::new("/vault"),
            DataKind::Klines,
            Some(KlineInterval::Hour1),
        );
        let archive =
            Path::new("/vault/data/futures/um/daily/klines/BTCUSDT/1h/BTCUSDT-1h-2023-01-01.zip");
        assert_eq!(
            pipeline.export_path(archive, OutputFormat::Parquet),
            PathBuf::from(
                "/vault/parsed/data/futures/um/daily/klines/BTCUSDT/1h/BTCUSDT-1h-2023-01-01.parquet"
            )
        );
    }

    #[tokio::test]
    async fn test_unparseable_kind_aborts_parse() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), DataKind::FundingRate, None);
        let result = pipeline.parse(&[Symbol::from("BTCUSDT")], None).await;
        assert!(matches!(result, Err(KlineVaultError::InvalidSchema(_))));
    }

    #[tokio::test]
    async fn test_status_of_empty_root() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), DataKind::Metrics, None);
        assert!(pipeline.local_symbols().unwrap().is_empty());
        assert!(pipeline.status(&[], None).await.unwrap().is_empty());
    }
}
