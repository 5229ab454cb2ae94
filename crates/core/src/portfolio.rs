use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::asset::Asset;
use crate::krw::Krw;

/// A single asset's position, valued at the latest observed price.
///
/// Invariant: `value_krw == amount * price` for the price used to build it
/// (KRW itself has `amount == value_krw` and an implicit price of 1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub amount: Decimal,
    pub value_krw: Krw,
}

impl Holding {
    pub fn new(amount: Decimal, value_krw: Krw) -> Self {
        Self { amount, value_krw }
    }

    pub fn krw(amount_krw: Krw) -> Self {
        Self {
            amount: Decimal::from(amount_krw.0),
            value_krw: amount_krw,
        }
    }
}

/// A priced snapshot of everything the account holds, rebuilt from the
/// exchange on every planner invocation — never cached across ticks.
///
/// Invariant: `total_krw == sum(holdings[a].value_krw for a in holdings)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub total_krw: Krw,
    pub holdings: BTreeMap<Asset, Holding>,
}

impl Portfolio {
    pub fn new(holdings: BTreeMap<Asset, Holding>) -> Self {
        let total_krw = holdings.values().map(|h| h.value_krw).sum();
        Self {
            total_krw,
            holdings,
        }
    }

    pub fn holding(&self, asset: Asset) -> Holding {
        self.holdings
            .get(&asset)
            .copied()
            .unwrap_or(Holding::new(Decimal::ZERO, Krw::ZERO))
    }

    /// Current weight of `asset` in the portfolio. `0` if the portfolio is
    /// empty (callers must special-case `total_krw == 0` before dividing).
    pub fn current_weight(&self, asset: Asset) -> Decimal {
        if self.total_krw.0 == 0 {
            return Decimal::ZERO;
        }
        Decimal::from(self.holding(asset).value_krw.0) / Decimal::from(self.total_krw.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn total_is_sum_of_holdings() {
        let mut holdings = BTreeMap::new();
        holdings.insert(Asset::Btc, Holding::new(dec!(0.08), Krw(4_000_000)));
        holdings.insert(Asset::Eth, Holding::new(dec!(1.2), Krw(3_000_000)));
        holdings.insert(Asset::Krw, Holding::krw(Krw(3_000_000)));

        let portfolio = Portfolio::new(holdings);
        assert_eq!(portfolio.total_krw, Krw(10_000_000));
    }

    #[test]
    fn current_weight_handles_empty_portfolio() {
        let portfolio = Portfolio::new(BTreeMap::new());
        assert_eq!(portfolio.current_weight(Asset::Btc), Decimal::ZERO);
    }

    #[test]
    fn current_weight_divides_by_total() {
        let mut holdings = BTreeMap::new();
        holdings.insert(Asset::Btc, Holding::new(dec!(0.08), Krw(4_000_000)));
        holdings.insert(Asset::Krw, Holding::krw(Krw(6_000_000)));
        let portfolio = Portfolio::new(holdings);
        assert_eq!(portfolio.current_weight(Asset::Btc), dec!(0.4));
    }
}
