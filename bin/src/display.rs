//! Display utilities and progress output for the klinevault CLI.

use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};
use klinevault_lib::prelude::*;
use klinevault_lib::{DownloadOutcome, VerificationReport};

/// Output format for exported tables.
#[derive(Clone, Copy, ValueEnum)]
pub(crate) enum Format {
    Csv,
    Json,
    Ndjson,
    Parquet,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Csv => Self::Csv,
            Format::Json => Self::Json,
            Format::Ndjson => Self::Ndjson,
            Format::Parquet => Self::Parquet,
        }
    }
}

/// Creates a bar counting downloaded files, hidden in quiet mode.
pub(crate) fn download_bar(total: usize, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg}",
    ) {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb
}

/// Creates a spinner for stages without a known length.
pub(crate) fn spinner(message: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    pb
}

/// Updates a download bar from a batch attempt.
pub(crate) fn on_attempt(pb: &ProgressBar, progress: &BatchProgress) {
    pb.set_position(progress.completed as u64);
    pb.set_message(format!(
        "batch {}/{} attempt {} ({} pending)",
        progress.batch, progress.batches, progress.attempt, progress.pending
    ));
}

/// Prints a download summary and every failed file.
pub(crate) fn print_download(report: &DownloadReport) {
    println!(
        "Downloaded {} files, {} already present, {} failed ({} batches, {} transfer attempts)",
        report.succeeded(),
        report.skipped(),
        report.failed(),
        report.batches,
        report.transfer_attempts
    );
    for (file, outcome) in &report.outcomes {
        if let DownloadOutcome::Failed(reason) = outcome {
            println!("  FAILED {}: {reason}", file.key());
        }
    }
    if report.sidecar_failures > 0 {
        println!("  {} checksum sidecars could not be fetched", report.sidecar_failures);
    }
}

/// Prints a verification summary and every file that did not verify.
pub(crate) fn print_verification(reports: &[VerificationReport]) {
    let verified = reports.iter().filter(|r| r.outcome.is_verified()).count();
    println!(
        "Verified {verified} of {} archives checked",
        reports.len()
    );
    for report in reports {
        let name = report.file.file_name();
        match &report.outcome {
            VerificationOutcome::Verified => {}
            VerificationOutcome::Mismatched { expected, actual } => {
                let action = if report.deleted { "deleted" } else { "flagged" };
                println!("  MISMATCH {name}: expected {expected}, got {actual} ({action})");
            }
            VerificationOutcome::SidecarMissing => println!("  NO CHECKSUM {name}"),
            VerificationOutcome::Failed(reason) => println!("  FAILED {name}: {reason}"),
        }
    }
}
