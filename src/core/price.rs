//! Spot prices and the cached snapshot that valuation reads from.

use crate::core::config::{AppConfig, SourceConfig};
use crate::core::decimal_json;
use crate::store::RecordStore;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Metal name to USD per troy ounce.
pub type PriceData = BTreeMap<String, Decimal>;

/// A price read from one source for one metal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Quote {
    Spot(Decimal),
    BidAsk { bid: Decimal, ask: Decimal },
}

impl Quote {
    /// The spot value, or the midpoint of bid and ask. `None` when the
    /// midpoint does not fit in a decimal.
    pub fn price(&self) -> Option<Decimal> {
        match self {
            Quote::Spot(price) => Some(*price),
            Quote::BidAsk { bid, ask } => bid.checked_add(*ask)?.checked_div(Decimal::TWO),
        }
    }
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Reads the quote for `metal` from the source declared as `name`.
    async fn fetch_quote(&self, name: &str, source: &SourceConfig, metal: &str) -> Result<Quote>;

    /// Called before each refresh; drops anything memoized by the last one.
    async fn reset(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Fresh,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Cached prices were within their time to live.
    Fresh,
    /// Price lookups are turned off in the config.
    Disabled,
    /// The named source priced every metal and was committed.
    Refreshed { source: String },
    /// No source priced every metal; the previous snapshot was kept.
    Exhausted,
}

/// The last committed price snapshot and when it was taken.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceCache {
    /// Unix timestamp in seconds.
    updated: Decimal,
    price_data: PriceData,
}

fn now() -> Decimal {
    Decimal::new(Utc::now().timestamp_millis(), 3)
}

impl PriceCache {
    pub fn new(updated: Decimal, price_data: PriceData) -> Self {
        Self {
            updated,
            price_data,
        }
    }

    /// Reads the persisted snapshot. A missing or unreadable record yields
    /// an empty, stale cache.
    pub fn load(store: &dyn RecordStore) -> Self {
        let text = match store.read() {
            Ok(Some(text)) => text,
            Ok(None) => {
                debug!("No price cache record, starting empty");
                return Self::default();
            }
            Err(e) => {
                warn!(error = %e, "Failed to read price cache, starting empty");
                return Self::default();
            }
        };

        match decimal_json::from_str::<PriceCache>(&text) {
            Ok(cache) => {
                debug!(updated = %cache.updated, "Loaded price cache");
                cache
            }
            Err(e) => {
                warn!(error = %e, "Ignoring corrupt price cache record");
                Self::default()
            }
        }
    }

    pub fn persist(&self, store: &dyn RecordStore) -> Result<()> {
        let text = decimal_json::to_string_pretty(self).context("Failed to encode price cache")?;
        store.write(&text)
    }

    pub fn updated(&self) -> Decimal {
        self.updated
    }

    pub fn price_data(&self) -> &PriceData {
        &self.price_data
    }

    pub fn price(&self, metal: &str) -> Option<Decimal> {
        self.price_data.get(metal).copied()
    }

    pub fn state(&self, metals: &[String], ttl_secs: u64) -> CacheState {
        self.state_at(metals, ttl_secs, now())
    }

    fn state_at(&self, metals: &[String], ttl_secs: u64, now: Decimal) -> CacheState {
        if self.price_data.is_empty() {
            return CacheState::Stale;
        }
        // An `updated` too far from now to subtract is corrupt, not fresh.
        match now.checked_sub(self.updated) {
            Some(age) if age <= Decimal::from(ttl_secs) => {}
            _ => return CacheState::Stale,
        }
        if metals.iter().any(|metal| !self.price_data.contains_key(metal)) {
            return CacheState::Stale;
        }
        CacheState::Fresh
    }

    /// Refreshes the snapshot when it is stale.
    pub async fn ensure_fresh(
        &mut self,
        config: &AppConfig,
        provider: &dyn PriceSource,
        store: &dyn RecordStore,
    ) -> RefreshOutcome {
        self.ensure_fresh_at(config, provider, store, now()).await
    }

    async fn ensure_fresh_at(
        &mut self,
        config: &AppConfig,
        provider: &dyn PriceSource,
        store: &dyn RecordStore,
        now: Decimal,
    ) -> RefreshOutcome {
        if !config.price_data.enabled {
            debug!("Price lookups disabled");
            return RefreshOutcome::Disabled;
        }
        if self.state_at(&config.metals, config.cache_update, now) == CacheState::Fresh {
            debug!(updated = %self.updated, "Price cache is fresh");
            return RefreshOutcome::Fresh;
        }
        self.refresh_at(config, provider, store, now).await
    }

    /// Queries sources in declared order and commits the first one that
    /// prices every configured metal.
    pub async fn refresh(
        &mut self,
        config: &AppConfig,
        provider: &dyn PriceSource,
        store: &dyn RecordStore,
    ) -> RefreshOutcome {
        self.refresh_at(config, provider, store, now()).await
    }

    async fn refresh_at(
        &mut self,
        config: &AppConfig,
        provider: &dyn PriceSource,
        store: &dyn RecordStore,
        now: Decimal,
    ) -> RefreshOutcome {
        provider.reset().await;
        for (name, source) in config.price_data.sources.iter() {
            match query_source(provider, name, source, &config.metals).await {
                Ok(price_data) => {
                    info!(source = name, "Committed prices");
                    self.updated = now;
                    self.price_data = price_data;
                    if let Err(e) = self.persist(store) {
                        warn!(error = %e, "Failed to persist price cache");
                    }
                    return RefreshOutcome::Refreshed {
                        source: name.to_string(),
                    };
                }
                Err(e) => warn!(source = name, error = %e, "Abandoning price source"),
            }
        }

        warn!("No price source could price every metal, keeping cached prices");
        RefreshOutcome::Exhausted
    }
}

// All-or-nothing: one missing metal discards everything read from the source.
async fn query_source(
    provider: &dyn PriceSource,
    name: &str,
    source: &SourceConfig,
    metals: &[String],
) -> Result<PriceData> {
    let mut price_data = PriceData::new();
    for metal in metals {
        let quote = provider
            .fetch_quote(name, source, metal)
            .await
            .with_context(|| format!("No price for {metal}"))?;
        let price = quote
            .price()
            .ok_or_else(|| anyhow!("Bid/ask midpoint out of range for {metal}"))?;
        if price <= Decimal::ZERO {
            return Err(anyhow!("Non-positive price {price} for {metal}"));
        }
        debug!(source = name, metal = %metal, price = %price, "Read price");
        price_data.insert(metal.clone(), price);
    }
    Ok(price_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{PriceDataConfig, PriceSources};
    use crate::store::memory::MemoryStore;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockPriceSource {
        quotes: HashMap<(String, String), Quote>,
        call_count: AtomicUsize,
    }

    impl MockPriceSource {
        fn new(quotes: &[(&str, &str, Quote)]) -> Self {
            Self {
                quotes: quotes
                    .iter()
                    .map(|(source, metal, quote)| ((source.to_string(), metal.to_string()), *quote))
                    .collect(),
                call_count: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PriceSource for MockPriceSource {
        async fn fetch_quote(&self, name: &str, _source: &SourceConfig, metal: &str) -> Result<Quote> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            self.quotes
                .get(&(name.to_string(), metal.to_string()))
                .copied()
                .ok_or_else(|| anyhow!("{name} has no quote for {metal}"))
        }
    }

    fn config(metals: &[&str], sources: &[&str]) -> AppConfig {
        AppConfig {
            metals: metals.iter().map(|m| m.to_string()).collect(),
            cache_update: 600,
            price_data: PriceDataConfig {
                enabled: true,
                sources: sources
                    .iter()
                    .map(|name| {
                        (
                            name.to_string(),
                            SourceConfig {
                                url: format!("http://{name}.example"),
                                symbol: BTreeMap::new(),
                                regex: Default::default(),
                            },
                        )
                    })
                    .collect::<PriceSources>(),
            },
            data_path: None,
            asset_dir: "data".to_string(),
            order_dir: "orders".to_string(),
            cache_file: ".cache.json".to_string(),
        }
    }

    fn snapshot(updated: Decimal, entries: &[(&str, Decimal)]) -> PriceCache {
        PriceCache::new(
            updated,
            entries.iter().map(|(m, p)| (m.to_string(), *p)).collect(),
        )
    }

    #[test]
    fn test_quote_price() {
        assert_eq!(Quote::Spot(dec!(2034.10)).price(), Some(dec!(2034.10)));
        let quote = Quote::BidAsk {
            bid: dec!(23.10),
            ask: dec!(23.35),
        };
        assert_eq!(quote.price(), Some(dec!(23.225)));

        let huge = Decimal::MAX / Decimal::TWO + Decimal::ONE;
        assert_eq!(Quote::BidAsk { bid: huge, ask: huge }.price(), None);
    }

    #[test]
    fn test_staleness() {
        let metals = vec!["gold".to_string(), "silver".to_string()];

        assert_eq!(
            PriceCache::default().state_at(&metals, 600, dec!(1000)),
            CacheState::Stale
        );

        let cache = snapshot(dec!(1000), &[("gold", dec!(2000)), ("silver", dec!(25))]);
        assert_eq!(cache.state_at(&metals, 600, dec!(1600)), CacheState::Fresh);
        assert_eq!(cache.state_at(&metals, 600, dec!(1600.001)), CacheState::Stale);

        let metals = vec!["gold".to_string(), "platinum".to_string()];
        assert_eq!(cache.state_at(&metals, 600, dec!(1001)), CacheState::Stale);
    }

    #[test]
    fn test_out_of_range_timestamp_is_stale() {
        let store = MemoryStore::new();
        store
            .write(r#"{"updated": "-79228162514264337593543950335", "price_data": {"gold": "2000"}}"#)
            .unwrap();
        let cache = PriceCache::load(&store);
        let metals = vec!["gold".to_string()];

        assert_eq!(cache.state(&metals, 600), CacheState::Stale);
        assert_eq!(cache.state_at(&metals, 600, dec!(1700000000)), CacheState::Stale);
    }

    #[tokio::test]
    async fn test_fresh_cache_makes_no_calls() {
        let provider = MockPriceSource::new(&[]);
        let store = MemoryStore::new();
        let config = config(&["gold"], &["primary"]);
        let mut cache = snapshot(dec!(1000), &[("gold", dec!(2000))]);

        let outcome = cache
            .ensure_fresh_at(&config, &provider, &store, dec!(1200))
            .await;
        assert_eq!(outcome, RefreshOutcome::Fresh);
        assert_eq!(provider.calls(), 0);
        assert!(store.contents().is_none());
    }

    #[tokio::test]
    async fn test_disabled_makes_no_calls() {
        let provider = MockPriceSource::new(&[("primary", "gold", Quote::Spot(dec!(1)))]);
        let store = MemoryStore::new();
        let mut config = config(&["gold"], &["primary"]);
        config.price_data.enabled = false;
        let mut cache = PriceCache::default();

        let outcome = cache.ensure_fresh(&config, &provider, &store).await;
        assert_eq!(outcome, RefreshOutcome::Disabled);
        assert_eq!(provider.calls(), 0);
        assert!(cache.price_data().is_empty());
    }

    #[tokio::test]
    async fn test_falls_back_without_mixing_sources() {
        let provider = MockPriceSource::new(&[
            ("primary", "gold", Quote::Spot(dec!(2001))),
            ("primary", "silver", Quote::Spot(dec!(25.01))),
            ("secondary", "gold", Quote::Spot(dec!(1999))),
            (
                "secondary",
                "silver",
                Quote::BidAsk {
                    bid: dec!(24.90),
                    ask: dec!(25.10),
                },
            ),
            ("secondary", "platinum", Quote::Spot(dec!(950))),
        ]);
        let store = MemoryStore::new();
        let config = config(&["gold", "silver", "platinum"], &["primary", "secondary"]);
        let mut cache = snapshot(dec!(0), &[("gold", dec!(1500))]);

        let outcome = cache
            .ensure_fresh_at(&config, &provider, &store, dec!(5000))
            .await;

        assert_eq!(
            outcome,
            RefreshOutcome::Refreshed {
                source: "secondary".to_string()
            }
        );
        assert_eq!(cache.updated(), dec!(5000));
        assert_eq!(
            cache.price_data(),
            &snapshot(
                dec!(0),
                &[
                    ("gold", dec!(1999)),
                    ("silver", dec!(25.00)),
                    ("platinum", dec!(950))
                ]
            )
            .price_data
        );

        // The committed snapshot was persisted and reads back identically.
        let reloaded = PriceCache::load(&store);
        assert_eq!(reloaded, cache);
    }

    #[tokio::test]
    async fn test_exhausted_sources_keep_snapshot() {
        let provider = MockPriceSource::new(&[
            ("primary", "gold", Quote::Spot(dec!(2001))),
            ("secondary", "silver", Quote::Spot(dec!(25))),
        ]);
        let store = MemoryStore::new();
        let config = config(&["gold", "silver"], &["primary", "secondary"]);
        let mut cache = snapshot(dec!(10), &[("gold", dec!(1500)), ("silver", dec!(20))]);
        let before = cache.clone();

        let outcome = cache
            .ensure_fresh_at(&config, &provider, &store, dec!(100000))
            .await;

        assert_eq!(outcome, RefreshOutcome::Exhausted);
        assert_eq!(cache, before);
        assert!(store.contents().is_none());
    }

    #[tokio::test]
    async fn test_non_positive_price_abandons_source() {
        let provider = MockPriceSource::new(&[
            ("primary", "gold", Quote::Spot(Decimal::ZERO)),
            ("secondary", "gold", Quote::Spot(dec!(2000))),
        ]);
        let store = MemoryStore::new();
        let config = config(&["gold"], &["primary", "secondary"]);
        let mut cache = PriceCache::default();

        let outcome = cache.refresh(&config, &provider, &store).await;
        assert_eq!(
            outcome,
            RefreshOutcome::Refreshed {
                source: "secondary".to_string()
            }
        );
        assert_eq!(cache.price("gold"), Some(dec!(2000)));
    }

    #[tokio::test]
    async fn test_overflowing_midpoint_abandons_source() {
        let huge = Decimal::MAX / Decimal::TWO + Decimal::ONE;
        let provider = MockPriceSource::new(&[
            ("primary", "gold", Quote::BidAsk { bid: huge, ask: huge }),
            ("secondary", "gold", Quote::Spot(dec!(2000))),
        ]);
        let store = MemoryStore::new();
        let config = config(&["gold"], &["primary", "secondary"]);
        let mut cache = PriceCache::default();

        let outcome = cache.refresh(&config, &provider, &store).await;
        assert_eq!(
            outcome,
            RefreshOutcome::Refreshed {
                source: "secondary".to_string()
            }
        );
        assert_eq!(cache.price("gold"), Some(dec!(2000)));
    }

    #[test]
    fn test_load_missing_or_corrupt_record() {
        let store = MemoryStore::new();
        assert_eq!(PriceCache::load(&store), PriceCache::default());

        store.write("{not json").unwrap();
        assert_eq!(PriceCache::load(&store), PriceCache::default());

        store.write(r#"{"updated": "abc", "price_data": {}}"#).unwrap();
        assert_eq!(PriceCache::load(&store), PriceCache::default());
    }

    #[test]
    fn test_load_numeric_record() {
        let store = MemoryStore::new();
        store
            .write(r#"{"updated": 1700000000.5, "price_data": {"gold": "1987.654321", "silver": 23.1}}"#)
            .unwrap();
        let cache = PriceCache::load(&store);
        assert_eq!(cache.updated(), dec!(1700000000.5));
        assert_eq!(cache.price("gold"), Some(dec!(1987.654321)));
        assert_eq!(cache.price("silver"), Some(dec!(23.1)));
    }

    #[test]
    fn test_persist_writes_decimal_strings() {
        let store = MemoryStore::new();
        let cache = snapshot(dec!(1700000000), &[("gold", dec!(2034.10))]);
        cache.persist(&store).unwrap();
        let text = store.contents().unwrap();
        assert!(text.contains(r#""gold": "2034.10""#));
        assert!(text.contains(r#""updated": "1700000000""#));
    }
}
