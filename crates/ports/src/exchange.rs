use std::collections::BTreeMap;

use async_trait::async_trait;
use rust_decimal::Decimal;

use kairos_core::{Asset, Krw, Side};
use kairos_core::schedule::ExchangeOrderId;

use crate::error::ExchangeError;

/// Order type. Slices are always placed as `Market` per spec (pluggable
/// execution style is a deliberate non-goal); `Limit` exists for
/// completeness of the wire contract and adapter validation paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Market,
    Limit,
}

/// State of a placed order as reported by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderState {
    /// An order in a terminal state will never transition further.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderState::Filled | OrderState::Cancelled | OrderState::Rejected
        )
    }
}

/// Result of a successful `place_order` call.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub order_id: ExchangeOrderId,
    pub state: OrderState,
}

/// Full status of a previously placed order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderStatusReport {
    pub state: OrderState,
    pub filled_amount: Decimal,
    pub average_price: Option<Decimal>,
    pub filled_krw: Krw,
    pub fees_krw: Krw,
}

/// The only component that speaks the exchange wire protocol.
///
/// `place_order` must validate, before placing: caller-side balance with a
/// safety margin, notional within the exchange's per-asset bounds
/// (downscaling and retrying on `NotionalAboveMax`/`InsufficientBalance`,
/// bounded by `max_retries`), and notional above the exchange minimum.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Total holdings including amounts locked in open orders.
    async fn get_balances(&self) -> Result<BTreeMap<Asset, Decimal>, ExchangeError>;

    /// Latest observed last-trade price, KRW per unit of `asset`. Falls
    /// back to the 24h close. Fails with `PriceUnavailable` if neither
    /// source yields a positive price.
    async fn get_last_price(&self, asset: Asset) -> Result<Krw, ExchangeError>;

    /// Place one order. `notional_krw` is the requested KRW size; for
    /// `OrderType::Limit`, `price` must be `Some`.
    ///
    /// `client_order_id` is caller-chosen and must be idempotent: if an
    /// order already exists under this id (a retried call after a crash
    /// between placement and persistence), the adapter returns that
    /// order's current state instead of creating a duplicate.
    async fn place_order(
        &self,
        client_order_id: &str,
        asset: Asset,
        side: Side,
        notional_krw: Krw,
        order_type: OrderType,
        price: Option<Krw>,
    ) -> Result<PlacedOrder, ExchangeError>;

    /// Idempotent with respect to already-filled/cancelled orders: cancelling
    /// one of those is treated as success, not an error.
    async fn cancel_order(&self, order_id: &ExchangeOrderId) -> Result<(), ExchangeError>;

    async fn get_order_status(
        &self,
        order_id: &ExchangeOrderId,
    ) -> Result<OrderStatusReport, ExchangeError>;
}
