//! CLI command implementations.

pub(crate) mod download;
pub(crate) mod exchange_info;
pub(crate) mod files;
pub(crate) mod parse;
pub(crate) mod status;
pub(crate) mod symbols;
pub(crate) mod sync;
pub(crate) mod verify;

use anyhow::{Context, Result};
use klinevault_lib::prelude::*;

/// Returns the requested symbols, or the symbols already mirrored locally.
pub(crate) fn local_or_requested(pipeline: &Pipeline, requested: Vec<Symbol>) -> Result<Vec<Symbol>> {
    if requested.is_empty() {
        pipeline
            .local_symbols()
            .context("Failed to scan local data root")
    } else {
        Ok(requested)
    }
}
