//! Totals across every order in the portfolio.

use crate::core::asset::AssetRegistry;
use crate::core::error::{PortfolioError, Result};
use crate::core::order::{MONEY_DP, Order, QUANTITY_DP, checked_sum, round_to};
use crate::core::price::PriceData;
use rust_decimal::Decimal;

/// Per-metal line of an account report.
#[derive(Debug, Clone, PartialEq)]
pub struct MetalHolding {
    pub metal: String,
    /// Pure metal held, troy ounces.
    pub quantity: Decimal,
    /// Current price per troy ounce, when known.
    pub price: Option<Decimal>,
}

/// Everything a caller needs to print a portfolio summary.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountReport {
    pub orders: usize,
    pub cost: Decimal,
    pub value: Decimal,
    pub profit: Decimal,
    pub holdings: Vec<MetalHolding>,
}

pub struct Account<'a> {
    orders: &'a [Order],
    assets: &'a AssetRegistry,
}

impl<'a> Account<'a> {
    pub fn new(orders: &'a [Order], assets: &'a AssetRegistry) -> Self {
        Self { orders, assets }
    }

    pub fn cost(&self) -> Result<Decimal> {
        let costs = self
            .orders
            .iter()
            .map(Order::cost)
            .collect::<Result<Vec<_>>>()?;
        Ok(round_to(checked_sum(costs, "account cost")?, MONEY_DP))
    }

    pub fn value(&self, prices: &PriceData) -> Result<Decimal> {
        let values = self
            .orders
            .iter()
            .map(|order| order.value(self.assets, prices))
            .collect::<Result<Vec<_>>>()?;
        Ok(round_to(checked_sum(values, "account value")?, MONEY_DP))
    }

    pub fn holding(&self, metal: &str) -> Result<Decimal> {
        let quantities = self
            .orders
            .iter()
            .map(|order| order.quantity(self.assets, metal))
            .collect::<Result<Vec<_>>>()?;
        Ok(round_to(checked_sum(quantities, metal)?, QUANTITY_DP))
    }

    /// Current value minus cost; negative when the portfolio is under water.
    pub fn profit(&self, prices: &PriceData) -> Result<Decimal> {
        difference(self.value(prices)?, self.cost()?)
    }

    pub fn report<S: AsRef<str>>(&self, prices: &PriceData, metals: &[S]) -> Result<AccountReport> {
        let holdings = metals
            .iter()
            .map(|metal| {
                let metal = metal.as_ref();
                Ok(MetalHolding {
                    metal: metal.to_string(),
                    quantity: self.holding(metal)?,
                    price: prices.get(metal).copied(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let value = self.value(prices)?;
        let cost = self.cost()?;
        Ok(AccountReport {
            orders: self.orders.len(),
            cost,
            value,
            profit: difference(value, cost)?,
            holdings,
        })
    }
}

fn difference(value: Decimal, cost: Decimal) -> Result<Decimal> {
    value
        .checked_sub(cost)
        .ok_or_else(|| PortfolioError::overflow("profit"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::asset::AssetRecord;
    use crate::core::error::PortfolioError;
    use crate::core::order::OrderContents;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn registry() -> AssetRegistry {
        AssetRegistry::load(vec![
            AssetRecord {
                token: "gold-1oz".to_string(),
                composition: BTreeMap::from([("gold".to_string(), dec!(0.9999))]),
                mass: None,
                weight: Some(dec!(1)),
                desc: String::new(),
            },
            AssetRecord {
                token: "silver-10g".to_string(),
                composition: BTreeMap::from([("silver".to_string(), dec!(0.999))]),
                mass: Some(dec!(10)),
                weight: None,
                desc: String::new(),
            },
        ])
        .unwrap()
    }

    fn orders() -> Vec<Order> {
        vec![
            Order::new(
                vec![
                    OrderContents::new("gold-1oz", dec!(1), dec!(1899.99)),
                    OrderContents::new("silver-10g", dec!(7), dec!(9.333)),
                ],
                dec!(0),
                dec!(14.95),
            ),
            Order::new(
                vec![OrderContents::new("silver-10g", dec!(13), dec!(9.127))],
                dec!(3.10),
                dec!(0),
            ),
        ]
    }

    fn prices() -> PriceData {
        BTreeMap::from([
            ("gold".to_string(), dec!(2034.15)),
            ("silver".to_string(), dec!(23.337)),
        ])
    }

    #[test]
    fn test_totals_equal_sum_of_orders() {
        let assets = registry();
        let orders = orders();
        let account = Account::new(&orders, &assets);
        let prices = prices();

        let cost: Decimal = orders.iter().map(|o| o.cost().unwrap()).sum();
        let value: Decimal = orders
            .iter()
            .map(|o| o.value(&assets, &prices).unwrap())
            .sum();

        assert_eq!(account.cost().unwrap(), cost);
        assert_eq!(account.value(&prices).unwrap(), value);
        assert_eq!(account.cost().unwrap().scale(), 2);
        assert_eq!(
            account.profit(&prices).unwrap(),
            account.value(&prices).unwrap() - account.cost().unwrap()
        );
    }

    #[test]
    fn test_holding() {
        let assets = registry();
        let orders = orders();
        let account = Account::new(&orders, &assets);

        // 20 * 10 g * 0.999 * 0.0321507 = 6.42370986 ozt, rounded per order
        // to 2.2483 + 4.1754.
        assert_eq!(account.holding("silver").unwrap(), dec!(6.4237));
        assert_eq!(account.holding("gold").unwrap(), dec!(0.9999));
        assert_eq!(account.holding("platinum").unwrap().to_string(), "0.0000");
    }

    #[test]
    fn test_profit_can_be_negative() {
        let assets = registry();
        let orders = orders();
        let account = Account::new(&orders, &assets);

        let profit = account.profit(&PriceData::new()).unwrap();
        assert_eq!(profit, -account.cost().unwrap());
        assert!(profit < Decimal::ZERO);
    }

    #[test]
    fn test_unknown_token_fails_valuation() {
        let assets = registry();
        let orders = vec![Order::new(
            vec![OrderContents::new("krugerrand", dec!(1), dec!(1800))],
            dec!(0),
            dec!(0),
        )];
        let account = Account::new(&orders, &assets);

        assert_eq!(account.cost().unwrap(), dec!(1800));
        assert_eq!(
            account.value(&prices()),
            Err(PortfolioError::NotFound("krugerrand".to_string()))
        );
    }

    #[test]
    fn test_overflowing_totals_are_errors() {
        let assets = registry();
        let orders = vec![
            Order::new(
                vec![OrderContents::new("gold-1oz", dec!(1), Decimal::MAX)],
                dec!(0),
                dec!(0),
            ),
            Order::new(
                vec![OrderContents::new("gold-1oz", dec!(1), Decimal::MAX)],
                dec!(0),
                dec!(0),
            ),
        ];
        let account = Account::new(&orders, &assets);

        assert!(matches!(account.cost(), Err(PortfolioError::Overflow(_))));
        assert!(account.report(&prices(), &["gold"]).is_err());
    }

    #[test]
    fn test_report() {
        let assets = registry();
        let orders = orders();
        let account = Account::new(&orders, &assets);
        let prices = BTreeMap::from([("gold".to_string(), dec!(2000))]);

        let report = account.report(&prices, &["gold", "silver"]).unwrap();
        assert_eq!(report.orders, 2);
        assert_eq!(report.cost, account.cost().unwrap());
        assert_eq!(report.value, dec!(1999.80));
        assert_eq!(report.profit, report.value - report.cost);
        assert_eq!(
            report.holdings,
            vec![
                MetalHolding {
                    metal: "gold".to_string(),
                    quantity: dec!(0.9999),
                    price: Some(dec!(2000)),
                },
                MetalHolding {
                    metal: "silver".to_string(),
                    quantity: dec!(6.4237),
                    price: None,
                },
            ]
        );
    }
}
