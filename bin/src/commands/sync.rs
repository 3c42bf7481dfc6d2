//! Full pipeline run.

use anyhow::{Context, Result};
use klinevault_lib::prelude::*;

use crate::display::{download_bar, on_attempt, print_download, print_verification};
use crate::settings::{Selection, Settings};

/// List, download, verify and optionally export the selected symbols.
pub(crate) async fn sync(
    settings: &Settings,
    selection: &Selection,
    format: Option<OutputFormat>,
    quiet: bool,
) -> Result<()> {
    let pipeline = settings.pipeline()?;
    let range = selection.range()?;

    let progress = download_bar(0, quiet);
    let report = pipeline
        .sync_with_progress(&selection.symbols(), range.as_ref(), format, |p| {
            progress.set_length(p.total as u64);
            on_attempt(&progress, p);
        })
        .await
        .context("Sync failed")?;
    progress.finish_and_clear();

    if !report.complete.is_empty() {
        println!(
            "{} of {} symbols already complete for the range",
            report.complete.len(),
            report.symbols.len()
        );
    }
    println!(
        "Listed {} archives for {} symbols",
        report.listing.total_files(),
        report.listing.files.len()
    );
    print_download(&report.download);
    print_verification(&report.verification);
    if format.is_some() {
        let exported = report.exports.iter().filter(|o| o.result.is_ok()).count();
        println!("Exported {exported} of {} archives", report.exports.len());
    }

    let errors = report.errors();
    if !errors.is_empty() {
        eprintln!("\n{} errors:", errors.len());
        for error in &errors {
            eprintln!("  {error}");
        }
    }
    Ok(())
}
