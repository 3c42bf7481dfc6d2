//! Parse command implementation.

use anyhow::{Context, Result};
use klinevault_lib::prelude::*;

use super::local_or_requested;
use crate::display::spinner;
use crate::settings::{Selection, Settings};

/// Parse verified archives, or export them when a format is given.
pub(crate) async fn parse(
    settings: &Settings,
    selection: &Selection,
    format: Option<OutputFormat>,
    quiet: bool,
) -> Result<()> {
    let pipeline = settings.pipeline()?;
    let range = selection.range()?;
    let symbols = local_or_requested(&pipeline, selection.symbols())?;

    let Some(format) = format else {
        let progress = spinner("Parsing archives", quiet);
        let report = pipeline
            .parse(&symbols, range.as_ref())
            .await
            .context("Parse failed")?;
        progress.finish_and_clear();

        for (path, table) in &report.tables {
            match table {
                Ok(table) => {
                    let span = table
                        .time_span()
                        .map(|(first, last)| format!("{first} .. {last}"))
                        .unwrap_or_default();
                    println!("{}\t{} rows\t{span}", path.display(), table.len());
                }
                Err(e) => println!("{}\tFAILED: {e}", path.display()),
            }
        }
        println!(
            "\nParsed {} archives ({} rows), {} failed",
            report.succeeded(),
            report.rows(),
            report.failed()
        );
        return Ok(());
    };

    let progress = spinner(&format!("Exporting archives as {format}"), quiet);
    let outcomes = pipeline
        .export(&symbols, range.as_ref(), format)
        .await
        .context("Export failed")?;
    progress.finish_and_clear();

    let mut failed = 0usize;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(path) => println!("{}", path.display()),
            Err(e) => {
                failed += 1;
                eprintln!("{}: {e}", outcome.archive.display());
            }
        }
    }
    println!(
        "\nExported {} archives to {}, {failed} failed",
        outcomes.len() - failed,
        pipeline.config().parsed_root().display()
    );
    Ok(())
}
