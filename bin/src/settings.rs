//! Command-line settings layered over the optional TOML configuration.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use klinevault_lib::prelude::*;
use std::path::PathBuf;
use tracing::debug;

/// Global options selecting the dataset and overriding the configuration file.
#[derive(Args, Debug)]
pub(crate) struct Settings {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Market segment (spot, um, cm)
    #[arg(long, global = true, default_value = "spot")]
    segment: String,

    /// Data kind (klines, markPriceKlines, metrics, ...)
    #[arg(long, global = true, default_value = "klines")]
    kind: String,

    /// Publication frequency (daily, monthly)
    #[arg(long, global = true, default_value = "daily")]
    frequency: String,

    /// Kline interval, used only by kline-shaped kinds
    #[arg(short, long, global = true, default_value = "1m")]
    interval: String,

    /// Local data root
    #[arg(long, global = true)]
    data_root: Option<PathBuf>,

    /// HTTP proxy for listing, metadata and transfers
    #[arg(long, global = true)]
    proxy: Option<String>,

    /// Transfer backend (auto, http, aria2)
    #[arg(long, global = true)]
    transfer: Option<String>,

    /// Files per download batch
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    /// Transfer attempts per batch
    #[arg(long, global = true)]
    max_tries: Option<u32>,

    /// Delete archives whose checksum does not match instead of flagging them
    #[arg(long, global = true)]
    delete_mismatched: bool,
}

impl Settings {
    /// Builds the pipeline configuration: file values first, then flags.
    pub(crate) fn config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_toml_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(root) = &self.data_root {
            config.data_root = root.clone();
        }
        if let Some(proxy) = &self.proxy {
            config.proxy = Some(proxy.clone());
        }
        if let Some(transfer) = &self.transfer {
            config.transfer = transfer.parse()?;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(max_tries) = self.max_tries {
            config.max_tries = max_tries;
        }
        if self.delete_mismatched {
            config.mismatch_policy = MismatchPolicy::Delete;
        }

        config.validate().context("Invalid configuration")?;
        debug!(
            event_type = "config_loaded",
            data_root = %config.data_root.display(),
            transfer = ?config.transfer,
            batch_size = config.batch_size,
            policy = ?config.mismatch_policy,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Returns the key layout selected by `--segment`, `--kind`, `--frequency`
    /// and `--interval`.
    pub(crate) fn builder(&self) -> Result<PathBuilder> {
        let segment: MarketSegment = self.segment.parse()?;
        let kind: DataKind = self.kind.parse()?;
        let frequency: Frequency = self.frequency.parse()?;
        let interval = if kind.is_kline() {
            Some(self.interval.parse::<KlineInterval>()?)
        } else {
            None
        };
        PathBuilder::new(segment, kind, frequency, interval)
            .with_context(|| format!("Unsupported dataset {segment}/{kind}/{frequency}"))
    }

    /// Returns the segment alone, for commands that do not touch archives.
    pub(crate) fn segment(&self) -> Result<MarketSegment> {
        Ok(self.segment.parse()?)
    }

    /// Creates a pipeline against the public bucket.
    pub(crate) fn pipeline(&self) -> Result<Pipeline> {
        Pipeline::from_config(self.config()?, self.builder()?).context("Failed to set up pipeline")
    }
}

/// Symbols and dates a command operates on.
#[derive(Args, Debug, Clone)]
pub(crate) struct Selection {
    /// Symbols (e.g. BTCUSDT); every published symbol when omitted
    pub(crate) symbols: Vec<String>,

    /// Start date (YYYY-MM-DD)
    #[arg(short, long)]
    pub(crate) start: Option<String>,

    /// End date (YYYY-MM-DD). Defaults to today when a start date is given.
    #[arg(short, long)]
    pub(crate) end: Option<String>,
}

impl Selection {
    /// Returns the requested symbols, uppercased.
    pub(crate) fn symbols(&self) -> Vec<Symbol> {
        self.symbols
            .iter()
            .map(|s| Symbol::new(s.to_uppercase()))
            .collect()
    }

    /// Returns the requested date range, if any.
    pub(crate) fn range(&self) -> Result<Option<DateRange>> {
        let start = self.start.as_deref().map(parse_date).transpose()?;
        let end = self.end.as_deref().map(parse_date).transpose()?;
        let range = match (start, end) {
            (None, None) => return Ok(None),
            (Some(start), Some(end)) => DateRange::new(start, end)?,
            (Some(start), None) => DateRange::new(start, chrono::Utc::now().date_naive())?,
            (None, Some(end)) => DateRange::single_day(end),
        };
        Ok(Some(range))
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("Invalid date: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        settings: Settings,
        #[command(flatten)]
        selection: Selection,
    }

    #[test]
    fn test_defaults_select_daily_spot_minutes() {
        let h = Harness::parse_from(["klinevault"]);
        let builder = h.settings.builder().unwrap();
        assert_eq!(builder.segment(), MarketSegment::Spot);
        assert_eq!(builder.kind(), DataKind::Klines);
        assert_eq!(builder.interval(), Some(KlineInterval::Minute1));
        assert!(h.selection.range().unwrap().is_none());
    }

    #[test]
    fn test_metrics_ignores_interval() {
        let h = Harness::parse_from(["klinevault", "--segment", "um", "--kind", "metrics"]);
        let builder = h.settings.builder().unwrap();
        assert_eq!(builder.interval(), None);
    }

    #[test]
    fn test_flags_override_config() {
        let h = Harness::parse_from([
            "klinevault",
            "--batch-size",
            "50",
            "--delete-mismatched",
            "--data-root",
            "/tmp/kv",
        ]);
        let config = h.settings.config().unwrap();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.mismatch_policy, MismatchPolicy::Delete);
        assert_eq!(config.data_root, PathBuf::from("/tmp/kv"));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let h = Harness::parse_from(["klinevault", "--batch-size", "0"]);
        assert!(h.settings.config().is_err());
    }

    #[test]
    fn test_selection() {
        let h = Harness::parse_from([
            "klinevault",
            "btcusdt",
            "ethusdt",
            "--start",
            "2023-01-01",
            "--end",
            "2023-01-02",
        ]);
        assert_eq!(
            h.selection.symbols(),
            vec![Symbol::from("BTCUSDT"), Symbol::from("ETHUSDT")]
        );
        assert_eq!(h.selection.range().unwrap().unwrap().total_days(), 2);

        let bad = Harness::parse_from(["klinevault", "--start", "2023-02-01", "--end", "2023-01-01"]);
        assert!(bad.selection.range().is_err());
    }
}
