use crate::cli::prices::{outcome_line, update_prices};
use crate::cli::ui::{self, StyleType};
use crate::core::account::{Account, AccountReport};
use crate::core::asset::{AssetRecord, AssetRegistry};
use crate::core::config::AppConfig;
use crate::core::order::{Order, OrderRecord};
use crate::core::price::{PriceCache, PriceSource};
use crate::store::disk::{FileStore, read_records};
use anyhow::{Context, Result};
use comfy_table::Cell;
use tracing::{debug, info};

/// Asset registry and orders read from the configured data directories.
pub fn load_portfolio(config: &AppConfig) -> Result<(AssetRegistry, Vec<Order>)> {
    let asset_path = config.asset_path()?;
    let records: Vec<AssetRecord> = read_records(&asset_path)?;
    let assets = AssetRegistry::load(records)
        .with_context(|| format!("Invalid assets in {}", asset_path.display()))?;

    let order_path = config.order_path()?;
    let orders = read_records::<OrderRecord>(&order_path)?
        .into_iter()
        .map(Order::try_from)
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Invalid order in {}", order_path.display()))?;

    info!(assets = assets.len(), orders = orders.len(), "Loaded portfolio");
    Ok((assets, orders))
}

/// Configured metals first, then any other metal an asset contains.
fn report_metals(config: &AppConfig, assets: &AssetRegistry) -> Vec<String> {
    let mut metals = config.metals.clone();
    for metal in assets.metals() {
        if !metals.contains(&metal) {
            metals.push(metal);
        }
    }
    metals
}

impl AccountReport {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Metal"),
            ui::header_cell("Holding (ozt)"),
            ui::header_cell("USD / ozt"),
        ]);
        for holding in &self.holdings {
            table.add_row(vec![
                Cell::new(&holding.metal),
                ui::decimal_cell(Some(holding.quantity)),
                ui::decimal_cell(holding.price),
            ]);
        }

        format!(
            "{}\n{}\n{} {}\n{} {}\n{} {}",
            ui::style_text(&format!("Portfolio ({} orders)", self.orders), StyleType::Title),
            table,
            ui::style_text("Cost:  ", StyleType::TotalLabel),
            ui::style_text(&self.cost.to_string(), StyleType::TotalValue),
            ui::style_text("Value: ", StyleType::TotalLabel),
            ui::style_text(&self.value.to_string(), StyleType::TotalValue),
            ui::style_text("Profit:", StyleType::TotalLabel),
            ui::profit_text(self.profit),
        )
    }
}

/// Values every order at current prices and prints the totals.
pub async fn run(config: &AppConfig, provider: &dyn PriceSource) -> Result<()> {
    let store = FileStore::new(config.cache_path()?);
    let mut cache = PriceCache::load(&store);
    let outcome = update_prices(&mut cache, config, provider, &store, false).await;
    debug!(?outcome, "Price update finished");

    let (assets, orders) = load_portfolio(config)?;
    let metals = report_metals(config, &assets);
    let report = Account::new(&orders, &assets)
        .report(cache.price_data(), &metals)
        .context("Failed to value portfolio")?;

    println!("\n{}", report.display_as_table());
    println!("{}", outcome_line(&outcome, cache.updated()));
    Ok(())
}
