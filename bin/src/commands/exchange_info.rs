//! Exchange metadata command.

use anyhow::{Context, Result};
use klinevault_lib::HttpClient;
use klinevault_lib::prelude::*;

use crate::settings::Settings;

/// Show `exchangeInfo` metadata for the selected segment.
pub(crate) async fn exchange_info(
    settings: &Settings,
    symbols: &[String],
    trading_only: bool,
) -> Result<()> {
    let config = settings.config()?;
    let segment = settings.segment()?;
    let client = HttpClient::from_pipeline(&config)?;
    let info = ExchangeInfoClient::new(client, segment)
        .exchange_info()
        .await
        .with_context(|| format!("Failed to fetch exchange info for {segment}"))?;

    let wanted: Vec<Symbol> = symbols.iter().map(|s| Symbol::new(s.to_uppercase())).collect();

    println!(
        "{:<16} {:<10} {:<8} {:<8} {:<16} {:<12}",
        "SYMBOL", "STATUS", "BASE", "QUOTE", "CONTRACT", "ONBOARD"
    );
    println!("{}", "-".repeat(74));

    let mut shown = 0usize;
    for (symbol, meta) in &info {
        if !wanted.is_empty() && !wanted.contains(symbol) {
            continue;
        }
        if trading_only && !meta.is_trading() {
            continue;
        }
        let onboard = meta
            .onboard_date
            .and_then(chrono::DateTime::from_timestamp_millis)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<16} {:<10} {:<8} {:<8} {:<16} {:<12}",
            symbol.as_str(),
            meta.status,
            meta.base_asset,
            meta.quote_asset,
            meta.contract_type.as_deref().unwrap_or("-"),
            onboard,
        );
        shown += 1;
    }

    for symbol in wanted.iter().filter(|s| !info.contains_key(*s)) {
        println!("{:<16} not listed on {segment}", symbol.as_str());
    }

    println!("\nTotal: {shown} symbols");
    Ok(())
}
