//! Purchase records and their valuation.
//!
//! Valuation is a pure function of an order, the [`AssetRegistry`] and a
//! price snapshot. Sums are rounded once per order, never per line.

use crate::core::asset::AssetRegistry;
use crate::core::error::{PortfolioError, Result};
use crate::core::price::PriceData;
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Decimal places for money amounts.
pub const MONEY_DP: u32 = 2;
/// Decimal places for metal quantities in troy ounces.
pub const QUANTITY_DP: u32 = 4;

/// Rounds half-to-even and pads to exactly `dp` places.
pub fn round_to(value: Decimal, dp: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven);
    rounded.rescale(dp);
    rounded
}

/// Sum of `values`, failing with [`PortfolioError::Overflow`] instead of
/// panicking.
pub(crate) fn checked_sum<I>(values: I, what: &str) -> Result<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
        .ok_or_else(|| PortfolioError::overflow(format!("sum of {what}")))
}

fn checked_product(factors: &[Decimal], what: &str) -> Result<Decimal> {
    factors
        .iter()
        .try_fold(Decimal::ONE, |acc, f| acc.checked_mul(*f))
        .ok_or_else(|| PortfolioError::overflow(format!("product for {what}")))
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ContentRecord {
    pub asset: String,
    pub quantity: Decimal,
    pub rate: Decimal,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OrderRecord {
    pub content: Vec<ContentRecord>,
    #[serde(default)]
    pub tax: Decimal,
    #[serde(default)]
    pub ship: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

/// One purchased line within an order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderContents {
    asset: String,
    quantity: Decimal,
    rate: Decimal,
}

impl OrderContents {
    pub fn new(asset: impl Into<String>, quantity: Decimal, rate: Decimal) -> Self {
        Self {
            asset: asset.into(),
            quantity,
            rate,
        }
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn rate(&self) -> Decimal {
        self.rate
    }

    /// Current metal value of the line. Metals without a price add nothing.
    pub fn value(&self, assets: &AssetRegistry, prices: &PriceData) -> Result<Decimal> {
        let asset = assets.lookup(&self.asset)?;
        let parts = asset
            .composition()
            .iter()
            .map(|(metal, purity)| {
                let price = prices.get(metal).copied().unwrap_or(Decimal::ZERO);
                checked_product(&[price, *purity, asset.weight(), self.quantity], &self.asset)
            })
            .collect::<Result<Vec<_>>>()?;
        checked_sum(parts, &self.asset)
    }

    /// Amount paid for the line.
    pub fn cost(&self) -> Result<Decimal> {
        checked_product(&[self.rate, self.quantity], &self.asset)
    }

    /// Pure `metal` content of the line in troy ounces.
    pub fn metal_quantity(&self, assets: &AssetRegistry, metal: &str) -> Result<Decimal> {
        let asset = assets.lookup(&self.asset)?;
        checked_product(
            &[asset.purity(metal), asset.weight(), self.quantity],
            &self.asset,
        )
    }
}

impl TryFrom<ContentRecord> for OrderContents {
    type Error = PortfolioError;

    fn try_from(record: ContentRecord) -> Result<Self> {
        if record.quantity <= Decimal::ZERO {
            return Err(PortfolioError::invalid(format!(
                "order line for {}: quantity must be positive, got {}",
                record.asset, record.quantity
            )));
        }
        if record.rate < Decimal::ZERO {
            return Err(PortfolioError::invalid(format!(
                "order line for {}: rate must not be negative, got {}",
                record.asset, record.rate
            )));
        }
        Ok(OrderContents::new(record.asset, record.quantity, record.rate))
    }
}

/// A purchase transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    content: Vec<OrderContents>,
    tax: Decimal,
    ship: Decimal,
    desc: Option<String>,
    date: Option<NaiveDate>,
}

impl Order {
    pub fn new(content: Vec<OrderContents>, tax: Decimal, ship: Decimal) -> Self {
        Self {
            content,
            tax,
            ship,
            desc: None,
            date: None,
        }
    }

    pub fn content(&self) -> &[OrderContents] {
        &self.content
    }

    pub fn desc(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn value(&self, assets: &AssetRegistry, prices: &PriceData) -> Result<Decimal> {
        let lines = self
            .content
            .iter()
            .map(|line| line.value(assets, prices))
            .collect::<Result<Vec<_>>>()?;
        Ok(round_to(checked_sum(lines, "order value")?, MONEY_DP))
    }

    /// Lines plus tax and shipping.
    pub fn cost(&self) -> Result<Decimal> {
        let mut parts = self
            .content
            .iter()
            .map(OrderContents::cost)
            .collect::<Result<Vec<_>>>()?;
        parts.extend([self.tax, self.ship]);
        Ok(round_to(checked_sum(parts, "order cost")?, MONEY_DP))
    }

    pub fn quantity(&self, assets: &AssetRegistry, metal: &str) -> Result<Decimal> {
        let lines = self
            .content
            .iter()
            .map(|line| line.metal_quantity(assets, metal))
            .collect::<Result<Vec<_>>>()?;
        Ok(round_to(checked_sum(lines, metal)?, QUANTITY_DP))
    }
}

impl TryFrom<OrderRecord> for Order {
    type Error = PortfolioError;

    fn try_from(record: OrderRecord) -> Result<Self> {
        if record.content.is_empty() {
            return Err(PortfolioError::invalid("order has no content"));
        }
        let content = record
            .content
            .into_iter()
            .map(OrderContents::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Order {
            content,
            tax: record.tax,
            ship: record.ship,
            desc: record.desc,
            date: record.date,
        })
    }
}
