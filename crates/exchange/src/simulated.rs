//! In-memory `ExchangeAdapter` + `PriceHistoryProvider` used by
//! scheduler/coordinator integration tests.
//!
//! Grounded on `athena-gateway::adapters::simulator` (a channel-driven
//! fake exchange for the teacher's agent simulation) — reworked here as a
//! direct trait implementation rather than a channel responder, since
//! `ExchangeAdapter` is called synchronously from one coordinator tick and
//! there is no multi-agent fan-in to arbitrate.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use kairos_core::schedule::ExchangeOrderId;
use kairos_core::{Asset, Krw, Side};
use kairos_ports::{
    ExchangeAdapter, ExchangeError, HistoryError, OrderState, OrderStatusReport, OrderType,
    PlacedOrder, PriceHistoryProvider,
};

use crate::limits::AdapterLimits;

#[derive(Debug, Clone)]
struct SimOrder {
    asset: Asset,
    side: Side,
    notional_krw: Krw,
    state: OrderState,
}

/// Deterministic in-memory exchange. Market orders fill immediately at
/// whatever price was last injected via `set_price`.
pub struct SimulatedExchange {
    prices: Mutex<BTreeMap<Asset, Krw>>,
    weekly_closes: Mutex<BTreeMap<Asset, Vec<Krw>>>,
    daily_closes: Mutex<BTreeMap<Asset, Vec<Krw>>>,
    balances: Mutex<BTreeMap<Asset, Decimal>>,
    orders: Mutex<HashMap<ExchangeOrderId, SimOrder>>,
    limits: AdapterLimits,
}

impl SimulatedExchange {
    pub fn new() -> Self {
        Self {
            prices: Mutex::new(BTreeMap::new()),
            weekly_closes: Mutex::new(BTreeMap::new()),
            daily_closes: Mutex::new(BTreeMap::new()),
            balances: Mutex::new(BTreeMap::new()),
            orders: Mutex::new(HashMap::new()),
            limits: AdapterLimits::default(),
        }
    }

    pub fn with_limits(limits: AdapterLimits) -> Self {
        let mut exchange = Self::new();
        exchange.limits = limits;
        exchange
    }

    pub fn set_price(&self, asset: Asset, price: Krw) {
        self.prices.lock().insert(asset, price);
    }

    pub fn set_balance(&self, asset: Asset, amount: Decimal) {
        self.balances.lock().insert(asset, amount);
    }

    pub fn set_weekly_closes(&self, asset: Asset, closes: Vec<Krw>) {
        self.weekly_closes.lock().insert(asset, closes);
    }

    pub fn set_daily_closes(&self, asset: Asset, closes: Vec<Krw>) {
        self.daily_closes.lock().insert(asset, closes);
    }

    fn price_of(&self, asset: Asset) -> Option<Krw> {
        self.prices.lock().get(&asset).copied().filter(|p| p.0 > 0)
    }

    /// Balance available to fund `side` on `asset`, expressed in KRW.
    fn available_krw(&self, asset: Asset, side: Side) -> Krw {
        let balances = self.balances.lock();
        match side {
            Side::Buy => {
                let krw = balances.get(&Asset::Krw).copied().unwrap_or(Decimal::ZERO);
                Krw(krw.try_into().unwrap_or(0))
            }
            Side::Sell => {
                let qty = balances.get(&asset).copied().unwrap_or(Decimal::ZERO);
                let price = self.price_of(asset).unwrap_or(Krw(0));
                Krw((qty * Decimal::from(price.0)).round().try_into().unwrap_or(0))
            }
        }
    }

    fn settle(&self, asset: Asset, side: Side, notional: Krw, price: Krw) {
        let mut balances = self.balances.lock();
        let qty = Decimal::from(notional.0) / Decimal::from(price.0);
        match side {
            Side::Buy => {
                *balances.entry(asset).or_insert(Decimal::ZERO) += qty;
                *balances.entry(Asset::Krw).or_insert(Decimal::ZERO) -= Decimal::from(notional.0);
            }
            Side::Sell => {
                *balances.entry(asset).or_insert(Decimal::ZERO) -= qty;
                *balances.entry(Asset::Krw).or_insert(Decimal::ZERO) += Decimal::from(notional.0);
            }
        }
    }
}

impl Default for SimulatedExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeAdapter for SimulatedExchange {
    async fn get_balances(&self) -> Result<BTreeMap<Asset, Decimal>, ExchangeError> {
        Ok(self.balances.lock().clone())
    }

    async fn get_last_price(&self, asset: Asset) -> Result<Krw, ExchangeError> {
        self.price_of(asset).ok_or(ExchangeError::PriceUnavailable)
    }

    async fn place_order(
        &self,
        client_order_id: &str,
        asset: Asset,
        side: Side,
        notional_krw: Krw,
        _order_type: OrderType,
        _price: Option<Krw>,
    ) -> Result<PlacedOrder, ExchangeError> {
        // Idempotent replay: a retried call after a crash between
        // placement and persistence returns the existing order.
        if let Some(existing) = self.orders.lock().get(client_order_id) {
            return Ok(PlacedOrder {
                order_id: client_order_id.to_string(),
                state: existing.state,
            });
        }

        let price = self.price_of(asset).ok_or(ExchangeError::PriceUnavailable)?;
        let available = self.available_krw(asset, side);
        let sized = self.limits.size_order(asset, notional_krw, available)?;

        self.settle(asset, side, sized, price);
        self.orders.lock().insert(
            client_order_id.to_string(),
            SimOrder {
                asset,
                side,
                notional_krw: sized,
                state: OrderState::Filled,
            },
        );

        Ok(PlacedOrder {
            order_id: client_order_id.to_string(),
            state: OrderState::Filled,
        })
    }

    async fn cancel_order(&self, order_id: &ExchangeOrderId) -> Result<(), ExchangeError> {
        let mut orders = self.orders.lock();
        match orders.get_mut(order_id) {
            Some(order) if !order.state.is_terminal() => {
                order.state = OrderState::Cancelled;
                Ok(())
            }
            // Already terminal, or never existed: cancelling is a no-op success.
            _ => Ok(()),
        }
    }

    async fn get_order_status(
        &self,
        order_id: &ExchangeOrderId,
    ) -> Result<OrderStatusReport, ExchangeError> {
        let orders = self.orders.lock();
        let order = orders
            .get(order_id)
            .ok_or_else(|| ExchangeError::Fatal(format!("unknown order {order_id}")))?;
        let price = self.price_of(order.asset).unwrap_or(Krw(0));
        let filled_amount = if price.0 > 0 {
            Decimal::from(order.notional_krw.0) / Decimal::from(price.0)
        } else {
            Decimal::ZERO
        };
        Ok(OrderStatusReport {
            state: order.state,
            filled_amount,
            average_price: Some(Decimal::from(price.0)),
            filled_krw: order.notional_krw,
            fees_krw: Krw(0),
        })
    }
}

#[async_trait]
impl PriceHistoryProvider for SimulatedExchange {
    async fn weekly_closes(&self, asset: Asset) -> Result<Vec<Krw>, HistoryError> {
        self.weekly_closes
            .lock()
            .get(&asset)
            .cloned()
            .filter(|v| !v.is_empty())
            .ok_or(HistoryError::Unavailable)
    }

    async fn daily_closes(&self, asset: Asset, days: u32) -> Result<Vec<Krw>, HistoryError> {
        let closes = self.daily_closes.lock();
        let series = closes.get(&asset).ok_or(HistoryError::Unavailable)?;
        let start = series.len().saturating_sub(days as usize);
        Ok(series[start..].to_vec())
    }

    async fn current_price(&self, asset: Asset) -> Result<Krw, HistoryError> {
        self.price_of(asset).ok_or(HistoryError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn place_order_fills_immediately_and_moves_balances() {
        let exchange = SimulatedExchange::new();
        exchange.set_price(Asset::Btc, Krw(50_000_000));
        exchange.set_balance(Asset::Krw, dec!(10_000_000));

        let placed = exchange
            .place_order("c1", Asset::Btc, Side::Buy, Krw(1_000_000), OrderType::Market, None)
            .await
            .unwrap();
        assert_eq!(placed.state, OrderState::Filled);

        let balances = exchange.get_balances().await.unwrap();
        assert_eq!(balances[&Asset::Krw], dec!(9_000_000));
        assert_eq!(balances[&Asset::Btc], dec!(0.02));
    }

    #[tokio::test]
    async fn place_order_is_idempotent_on_client_order_id() {
        let exchange = SimulatedExchange::new();
        exchange.set_price(Asset::Btc, Krw(50_000_000));
        exchange.set_balance(Asset::Krw, dec!(10_000_000));

        let first = exchange
            .place_order("c1", Asset::Btc, Side::Buy, Krw(1_000_000), OrderType::Market, None)
            .await
            .unwrap();
        let second = exchange
            .place_order("c1", Asset::Btc, Side::Buy, Krw(1_000_000), OrderType::Market, None)
            .await
            .unwrap();
        assert_eq!(first.order_id, second.order_id);

        let balances = exchange.get_balances().await.unwrap();
        // Balance only moved once, not twice.
        assert_eq!(balances[&Asset::Krw], dec!(9_000_000));
    }

    #[tokio::test]
    async fn cancel_is_idempotent_on_unknown_and_terminal_orders() {
        let exchange = SimulatedExchange::new();
        assert!(exchange.cancel_order(&"never-existed".to_string()).await.is_ok());

        exchange.set_price(Asset::Btc, Krw(50_000_000));
        exchange.set_balance(Asset::Krw, dec!(10_000_000));
        exchange
            .place_order("c1", Asset::Btc, Side::Buy, Krw(1_000_000), OrderType::Market, None)
            .await
            .unwrap();
        // already Filled (terminal) - cancelling is still a success.
        assert!(exchange.cancel_order(&"c1".to_string()).await.is_ok());
    }

    #[tokio::test]
    async fn missing_price_is_price_unavailable() {
        let exchange = SimulatedExchange::new();
        let err = exchange.get_last_price(Asset::Btc).await;
        assert!(matches!(err, Err(ExchangeError::PriceUnavailable)));
    }
}
