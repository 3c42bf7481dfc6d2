//! Verify command implementation.

use anyhow::{Context, Result};

use super::local_or_requested;
use crate::display::{print_verification, spinner};
use crate::settings::{Selection, Settings};

/// Check unverified local archives against their sidecars.
pub(crate) async fn verify(settings: &Settings, selection: &Selection, quiet: bool) -> Result<()> {
    let pipeline = settings.pipeline()?;
    let symbols = local_or_requested(&pipeline, selection.symbols())?;

    let progress = spinner("Verifying archives", quiet);
    let reports = pipeline
        .verify(&symbols)
        .await
        .context("Verification failed")?;
    progress.finish_and_clear();

    print_verification(&reports);
    Ok(())
}
