//! Local verification status.

use anyhow::{Context, Result};

use crate::settings::{Selection, Settings};

/// Print verified, unverified, mismatched and missing counts per symbol.
pub(crate) async fn status(settings: &Settings, selection: &Selection) -> Result<()> {
    let pipeline = settings.pipeline()?;
    let range = selection.range()?;
    let statuses = pipeline
        .status(&selection.symbols(), range.as_ref())
        .await
        .context("Failed to read local state")?;

    if statuses.is_empty() {
        println!(
            "No local archives under {}",
            pipeline.config().data_root.display()
        );
        return Ok(());
    }

    println!(
        "{:<16} {:>10} {:>10} {:>10} {:>10}",
        "SYMBOL", "VERIFIED", "UNVERIFIED", "MISMATCH", "MISSING"
    );
    println!("{}", "-".repeat(60));
    for status in &statuses {
        let missing = status
            .missing
            .map_or_else(|| "-".to_string(), |n| n.to_string());
        println!(
            "{:<16} {:>10} {:>10} {:>10} {:>10}",
            status.symbol.as_str(), status.verified, status.unverified, status.mismatched, missing
        );
    }

    if let Some(range) = &range {
        println!("\nRange: {range}");
    }
    println!("Total: {} symbols", statuses.len());
    Ok(())
}
