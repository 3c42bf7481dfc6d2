//! Download command implementation.

use anyhow::{Context, Result};

use crate::display::{download_bar, on_attempt, print_download, spinner};
use crate::settings::{Selection, Settings};

/// Mirror archives and sidecars for the selected symbols.
pub(crate) async fn download(settings: &Settings, selection: &Selection, quiet: bool) -> Result<()> {
    let pipeline = settings.pipeline()?;
    let range = selection.range()?;

    let listing_bar = spinner("Listing archives", quiet);
    let symbols = pipeline
        .resolve_symbols(&selection.symbols())
        .await
        .context("Failed to list symbols")?;
    let listing = pipeline.list(&symbols, range.as_ref()).await;
    listing_bar.finish_and_clear();

    for (symbol, error) in &listing.errors {
        eprintln!("Listing failed for {symbol}: {error}");
    }
    let refs = listing.into_refs();

    let progress = download_bar(refs.len(), quiet);
    let report = pipeline
        .download(&refs, |p| on_attempt(&progress, p))
        .await
        .context("Download failed")?;
    progress.finish_and_clear();

    print_download(&report);
    if report.failed() > 0 {
        anyhow::bail!("{} files could not be downloaded", report.failed());
    }
    Ok(())
}
