//! Portfolio model, price snapshot and configuration

pub mod account;
pub mod asset;
pub mod cache;
pub mod config;
pub mod decimal_json;
pub mod error;
pub mod log;
pub mod order;
pub mod price;

// Re-export main types for cleaner imports
pub use account::{Account, AccountReport};
pub use asset::{Asset, AssetRegistry};
pub use error::PortfolioError;
pub use order::{Order, OrderContents};
pub use price::{PriceCache, PriceData, PriceSource, RefreshOutcome};
