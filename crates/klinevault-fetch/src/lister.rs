//! Symbol and archive discovery.

use futures::stream::{self, StreamExt};
use klinevault_types::{
    ARCHIVE_SUFFIX, DateRange, KlineVaultError, PathBuilder, RemoteFileRef, Result, Symbol,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::RemoteStore;

/// Per-symbol listings of a batch request.
///
/// Every requested symbol has an entry in `files`; a symbol whose listing
/// failed maps to an empty sequence and its error is kept in `errors`.
#[derive(Debug, Default)]
pub struct BatchListing {
    /// Archives per symbol, sorted by date.
    pub files: BTreeMap<Symbol, Vec<RemoteFileRef>>,
    /// Listing failures per symbol.
    pub errors: BTreeMap<Symbol, KlineVaultError>,
}

impl BatchListing {
    /// Returns the total number of archives across symbols.
    #[must_use]
    pub fn total_files(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    /// Returns true if every symbol was listed successfully.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// Consumes the listing and returns every archive reference.
    #[must_use]
    pub fn into_refs(self) -> Vec<RemoteFileRef> {
        self.files.into_values().flatten().collect()
    }
}

/// Lists symbols and dated archives for one key layout.
#[derive(Clone)]
pub struct Lister {
    store: Arc<dyn RemoteStore>,
    builder: PathBuilder,
    concurrency: usize,
}

impl std::fmt::Debug for Lister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lister")
            .field("builder", &self.builder)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl Lister {
    /// Creates a lister; `concurrency` caps simultaneous per-symbol listings.
    #[must_use]
    pub fn new(store: Arc<dyn RemoteStore>, builder: PathBuilder, concurrency: usize) -> Self {
        Self {
            store,
            builder,
            concurrency: concurrency.max(1),
        }
    }

    /// Returns the key layout being listed.
    #[must_use]
    pub const fn builder(&self) -> &PathBuilder {
        &self.builder
    }

    /// Lists the symbols published for this layout, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`KlineVaultError::RemoteUnavailable`] if the listing fails.
    pub async fn list_symbols(&self) -> Result<Vec<Symbol>> {
        let prefix = self.builder.root_prefix();
        let listing = self.store.list_dir(&prefix).await?;

        let mut symbols: Vec<Symbol> = listing
            .directory_names()
            .into_iter()
            .map(Symbol::from)
            .collect();
        symbols.sort();
        symbols.dedup();

        info!(
            event_type = "symbols_listed",
            prefix = %prefix,
            count = symbols.len(),
            "Listed symbols"
        );
        Ok(symbols)
    }

    /// Lists the dated archives of one symbol, sorted by date.
    ///
    /// Sidecars and objects whose name carries no date token are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`KlineVaultError::RemoteUnavailable`] if the listing fails.
    pub async fn list_files(&self, symbol: &Symbol) -> Result<Vec<RemoteFileRef>> {
        let prefix = self.builder.symbol_prefix(symbol);
        let listing = self.store.list_dir(&prefix).await?;

        let mut files: Vec<RemoteFileRef> = listing
            .objects
            .iter()
            .filter(|object| object.key.ends_with(ARCHIVE_SUFFIX))
            .filter_map(|object| self.builder.from_key(symbol, &object.key))
            .collect();
        files.sort_by(|a, b| a.date().cmp(&b.date()));
        files.dedup_by(|a, b| a.key() == b.key());

        info!(
            event_type = "files_listed",
            symbol = %symbol,
            count = files.len(),
            "Listed archives"
        );
        Ok(files)
    }

    /// Lists the archives of one symbol that overlap a date range.
    ///
    /// # Errors
    ///
    /// Returns [`KlineVaultError::RemoteUnavailable`] if the listing fails.
    pub async fn list_files_in_range(
        &self,
        symbol: &Symbol,
        range: &DateRange,
    ) -> Result<Vec<RemoteFileRef>> {
        let files = self.list_files(symbol).await?;
        Ok(files
            .into_iter()
            .filter(|file| range.overlaps(&file.date()))
            .collect())
    }

    /// Lists many symbols with bounded fan-out.
    pub async fn list_files_batch(&self, symbols: &[Symbol]) -> BatchListing {
        self.list_batch(symbols, None).await
    }

    /// Lists many symbols with bounded fan-out, keeping archives in `range`.
    pub async fn list_files_batch_in_range(
        &self,
        symbols: &[Symbol],
        range: &DateRange,
    ) -> BatchListing {
        self.list_batch(symbols, Some(range)).await
    }

    async fn list_batch(&self, symbols: &[Symbol], range: Option<&DateRange>) -> BatchListing {
        let results: Vec<(Symbol, Result<Vec<RemoteFileRef>>)> = stream::iter(symbols.iter())
            .map(|symbol| async move {
                let result = match range {
                    Some(range) => self.list_files_in_range(symbol, range).await,
                    None => self.list_files(symbol).await,
                };
                (symbol.clone(), result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut batch = BatchListing::default();
        for (symbol, result) in results {
            match result {
                Ok(files) => {
                    batch.files.insert(symbol, files);
                }
                Err(e) => {
                    warn!(
                        event_type = "listing_failed",
                        symbol = %symbol,
                        error = %e,
                        "Symbol listing failed"
                    );
                    batch.files.insert(symbol.clone(), Vec::new());
                    batch.errors.insert(symbol, e);
                }
            }
        }
        batch
    }
}
