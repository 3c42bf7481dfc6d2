//! Remote symbol listing.

use anyhow::{Context, Result};

use crate::settings::Settings;

/// Print every symbol published for the selected layout.
pub(crate) async fn symbols(settings: &Settings, search: Option<&str>) -> Result<()> {
    let pipeline = settings.pipeline()?;
    let symbols = pipeline
        .lister()
        .list_symbols()
        .await
        .context("Failed to list symbols")?;

    let pattern = search.map(str::to_uppercase);
    let mut shown = 0usize;
    for symbol in &symbols {
        if pattern
            .as_deref()
            .is_some_and(|p| !symbol.as_str().contains(p))
        {
            continue;
        }
        println!("{symbol}");
        shown += 1;
    }

    eprintln!("{shown} of {} symbols", symbols.len());
    Ok(())
}
