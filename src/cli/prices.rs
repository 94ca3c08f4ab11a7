use crate::cli::ui::{self, StyleType};
use crate::core::config::AppConfig;
use crate::core::price::{PriceCache, PriceSource, RefreshOutcome};
use crate::store::RecordStore;
use crate::store::disk::FileStore;
use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Brings the cached snapshot up to date, or forces a new one when `force`.
pub async fn update_prices(
    cache: &mut PriceCache,
    config: &AppConfig,
    provider: &dyn PriceSource,
    store: &dyn RecordStore,
    force: bool,
) -> RefreshOutcome {
    let spinner = ui::new_spinner("Fetching spot prices...");
    let outcome = if force {
        cache.refresh(config, provider, store).await
    } else {
        cache.ensure_fresh(config, provider, store).await
    };
    spinner.finish_and_clear();
    outcome
}

/// A line describing where the displayed prices came from.
pub fn outcome_line(outcome: &RefreshOutcome, updated: Decimal) -> String {
    let when = format_updated(updated);
    match outcome {
        RefreshOutcome::Fresh => ui::style_text(&format!("Cached prices from {when}"), StyleType::Subtle),
        RefreshOutcome::Disabled => ui::style_text(
            &format!("Price lookups disabled, using prices from {when}"),
            StyleType::Subtle,
        ),
        RefreshOutcome::Refreshed { source } => ui::style_text(
            &format!("Prices from {source} at {when}"),
            StyleType::Subtle,
        ),
        RefreshOutcome::Exhausted => ui::style_text(
            &format!("Warning: no price source priced every metal, using prices from {when}"),
            StyleType::Warning,
        ),
    }
}

/// Local time of a snapshot timestamp, or "never" for an empty snapshot.
pub fn format_updated(updated: Decimal) -> String {
    if updated <= Decimal::ZERO {
        return "never".to_string();
    }
    updated
        .trunc()
        .to_i64()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map_or_else(
            || updated.to_string(),
            |time| {
                time.with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            },
        )
}

/// Prints the current price snapshot for the configured metals.
pub async fn run(config: &AppConfig, provider: &dyn PriceSource, force: bool) -> Result<()> {
    let store = FileStore::new(config.cache_path()?);
    let mut cache = PriceCache::load(&store);
    let outcome = update_prices(&mut cache, config, provider, &store, force).await;

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Metal"), ui::header_cell("USD / ozt")]);
    for metal in &config.metals {
        table.add_row(vec![
            comfy_table::Cell::new(metal),
            ui::decimal_cell(cache.price(metal)),
        ]);
    }

    println!("\n{}", ui::style_text("Spot Prices", StyleType::Title));
    println!("{table}");
    println!("{}", outcome_line(&outcome, cache.updated()));
    Ok(())
}
