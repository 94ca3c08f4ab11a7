//! Bullion products and the registry that resolves them by token.

use crate::core::error::{PortfolioError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Troy ounces per gram (0.0321507).
pub const GRAMS_TO_TROY_OUNCES: Decimal = Decimal::from_parts(321_507, 0, 0, false, 7);

/// An asset as it appears in an asset file.
///
/// Exactly one of `mass` (grams) or `weight` (troy ounces) must be given.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AssetRecord {
    pub token: String,
    pub composition: BTreeMap<String, Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mass: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<Decimal>,
    #[serde(default)]
    pub desc: String,
}

/// A purchasable bullion product.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    token: String,
    composition: BTreeMap<String, Decimal>,
    mass: Decimal,
    weight: Decimal,
    desc: String,
}

impl Asset {
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Metal name to purity fraction.
    pub fn composition(&self) -> &BTreeMap<String, Decimal> {
        &self.composition
    }

    /// Purity of `metal`, zero when the asset does not contain it.
    pub fn purity(&self, metal: &str) -> Decimal {
        self.composition
            .get(metal)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Mass in grams.
    pub fn mass(&self) -> Decimal {
        self.mass
    }

    /// Mass in troy ounces.
    pub fn weight(&self) -> Decimal {
        self.weight
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }
}

impl TryFrom<AssetRecord> for Asset {
    type Error = PortfolioError;

    fn try_from(record: AssetRecord) -> Result<Self> {
        if record.token.is_empty() {
            return Err(PortfolioError::invalid("asset token is empty"));
        }

        for (metal, purity) in &record.composition {
            if *purity < Decimal::ZERO || *purity > Decimal::ONE {
                return Err(PortfolioError::invalid(format!(
                    "asset {}: purity {} of {} is outside [0, 1]",
                    record.token, purity, metal
                )));
            }
        }

        let (mass, weight) = match (record.mass, record.weight) {
            (Some(mass), None) => (Some(mass), mass.checked_mul(GRAMS_TO_TROY_OUNCES)),
            (None, Some(weight)) => (weight.checked_div(GRAMS_TO_TROY_OUNCES), Some(weight)),
            (Some(_), Some(_)) => {
                return Err(PortfolioError::invalid(format!(
                    "asset {}: give either mass or weight, not both",
                    record.token
                )));
            }
            (None, None) => {
                return Err(PortfolioError::invalid(format!(
                    "asset {}: missing mass",
                    record.token
                )));
            }
        };
        let (Some(mass), Some(weight)) = (mass, weight) else {
            return Err(PortfolioError::invalid(format!(
                "asset {}: mass or weight is out of range",
                record.token
            )));
        };

        if weight <= Decimal::ZERO {
            return Err(PortfolioError::invalid(format!(
                "asset {}: weight must be positive, got {}",
                record.token, weight
            )));
        }

        Ok(Asset {
            token: record.token,
            composition: record.composition,
            mass,
            weight,
            desc: record.desc,
        })
    }
}

/// Token to asset lookup, built once at load time.
#[derive(Debug, Default)]
pub struct AssetRegistry {
    assets: HashMap<String, Asset>,
}

impl AssetRegistry {
    pub fn load<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = AssetRecord>,
    {
        let mut assets = HashMap::new();
        for record in records {
            let asset = Asset::try_from(record)?;
            if assets.contains_key(&asset.token) {
                return Err(PortfolioError::invalid(format!(
                    "duplicate asset token: {}",
                    asset.token
                )));
            }
            debug!(token = %asset.token, weight = %asset.weight, "Registered asset");
            assets.insert(asset.token.clone(), asset);
        }
        Ok(Self { assets })
    }

    pub fn lookup(&self, token: &str) -> Result<&Asset> {
        self.assets
            .get(token)
            .ok_or_else(|| PortfolioError::NotFound(token.to_string()))
    }

    /// Every metal referenced by at least one asset.
    pub fn metals(&self) -> BTreeSet<String> {
        self.assets
            .values()
            .flat_map(|asset| asset.composition.keys().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
