//! Remote archive listing.

use anyhow::Result;

use crate::settings::{Selection, Settings};

/// List the archives published for the selected symbols.
pub(crate) async fn files(settings: &Settings, selection: &Selection) -> Result<()> {
    let pipeline = settings.pipeline()?;
    let range = selection.range()?;
    let symbols = pipeline.resolve_symbols(&selection.symbols()).await?;
    let listing = pipeline.list(&symbols, range.as_ref()).await;

    for (symbol, files) in &listing.files {
        for file in files {
            println!("{symbol}\t{}\t{}", file.date(), file.key());
        }
    }
    for (symbol, error) in &listing.errors {
        eprintln!("{symbol}: {error}");
    }

    eprintln!(
        "{} files for {} symbols ({} failed)",
        listing.total_files(),
        listing.files.len(),
        listing.errors.len()
    );
    Ok(())
}
