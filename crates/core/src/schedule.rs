use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::asset::{Asset, Side};
use crate::krw::Krw;
use crate::portfolio::Portfolio;
use crate::season::Season;
use crate::weights::TargetWeights;
use crate::Timestamp;

/// Exchange-assigned identifier for a placed order.
pub type ExchangeOrderId = String;

/// Lifecycle status of a `TwapSchedule` as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleStatus {
    Active,
    Completed,
    Cancelled,
    Failed,
}

/// Lifecycle status of a single `TwapOrder` within a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TwapOrderStatus {
    Pending,
    Executing,
    Completed,
    Failed,
    Cancelled,
}

impl TwapOrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TwapOrderStatus::Completed | TwapOrderStatus::Failed | TwapOrderStatus::Cancelled
        )
    }
}

/// A record of one exchange order placed in service of a `TwapOrder`,
/// mirroring the `twap_exchange_orders` schema table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeOrderRecord {
    pub order_id: ExchangeOrderId,
    pub placed_at: Timestamp,
    pub filled_krw: Krw,
}

/// One asset's slice of a rebalance, sliced across time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwapOrder {
    pub asset: Asset,
    pub side: Side,
    pub total_krw: Krw,
    pub slice_count: u32,
    pub slice_notional_krw: Krw,
    pub slice_interval: Duration,
    pub start_at: Timestamp,
    pub executed_slices: u32,
    pub remaining_krw: Krw,
    pub last_execution_at: Option<Timestamp>,
    pub last_drift_check_at: Option<Timestamp>,
    pub status: TwapOrderStatus,
    pub exchange_order_ids: Vec<ExchangeOrderId>,
}

impl TwapOrder {
    pub fn new(
        asset: Asset,
        side: Side,
        total_krw: Krw,
        slice_count: u32,
        slice_interval: Duration,
        start_at: Timestamp,
    ) -> Self {
        assert!(slice_count >= 1, "slice_count must be >= 1");
        let slice_notional_krw = Krw(total_krw.0 / slice_count as i64);
        Self {
            asset,
            side,
            total_krw,
            slice_count,
            slice_notional_krw,
            slice_interval,
            start_at,
            executed_slices: 0,
            remaining_krw: total_krw,
            last_execution_at: None,
            last_drift_check_at: None,
            status: TwapOrderStatus::Pending,
            exchange_order_ids: Vec::new(),
        }
    }

    /// The 1-indexed slice number that is currently due to execute, if any.
    pub fn next_slice_number(&self) -> Option<u32> {
        if self.executed_slices >= self.slice_count || self.status.is_terminal() {
            return None;
        }
        Some(self.executed_slices + 1)
    }

    /// Notional for slice `n` (1-indexed): every slice gets
    /// `slice_notional_krw` except the last, which absorbs the residual so
    /// the sum of all slices equals `total_krw` exactly.
    pub fn notional_for_slice(&self, n: u32) -> Krw {
        if n == self.slice_count {
            let already_allocated = Krw(self.slice_notional_krw.0 * (self.slice_count as i64 - 1));
            self.total_krw - already_allocated
        } else {
            self.slice_notional_krw
        }
    }

    /// `now >= start_at + (n-1) * slice_interval` for the next due slice.
    pub fn is_due(&self, now: Timestamp) -> bool {
        match self.next_slice_number() {
            Some(n) => now >= self.start_at + self.slice_interval * (n as i32 - 1),
            None => false,
        }
    }

    /// Record one successfully placed slice.
    pub fn record_execution(
        &mut self,
        order_id: ExchangeOrderId,
        filled_krw: Krw,
        now: Timestamp,
    ) {
        self.exchange_order_ids.push(order_id);
        self.executed_slices += 1;
        self.remaining_krw = Krw((self.remaining_krw.0 - filled_krw.0).max(0));
        self.last_execution_at = Some(now);
        if self.status == TwapOrderStatus::Pending {
            self.status = TwapOrderStatus::Executing;
        }
        self.reconcile_completion();
    }

    /// `Completed` once every slice has executed, or the residual left to
    /// trade has fallen below `min_notional` (short-fill acceptance).
    pub fn reconcile_completion(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        if self.executed_slices >= self.slice_count {
            self.status = TwapOrderStatus::Completed;
        }
    }

    pub fn accept_short_fill(&mut self, min_notional: Krw) {
        if !self.status.is_terminal() && self.remaining_krw < min_notional {
            self.status = TwapOrderStatus::Completed;
        }
    }

    pub fn mark_failed(&mut self) {
        if !self.status.is_terminal() {
            self.status = TwapOrderStatus::Failed;
        }
    }

    pub fn mark_cancelled(&mut self) {
        if !self.status.is_terminal() {
            self.status = TwapOrderStatus::Cancelled;
        }
    }
}

/// The central durable entity of the TWAP scheduler: a set of per-asset
/// sliced orders produced from one rebalance plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwapSchedule {
    pub schedule_id: Uuid,
    pub created_at: Timestamp,
    pub season_at_creation: Season,
    pub target_weights: TargetWeights,
    /// Priced portfolio snapshot the rebalance plan was built against;
    /// carried through to the `RebalanceAudit` written once the schedule
    /// leaves `Active`.
    pub initial_portfolio: Portfolio,
    pub orders: Vec<TwapOrder>,
    pub status: ScheduleStatus,
}

impl TwapSchedule {
    pub fn new(
        created_at: Timestamp,
        season_at_creation: Season,
        target_weights: TargetWeights,
        initial_portfolio: Portfolio,
        orders: Vec<TwapOrder>,
    ) -> Self {
        Self {
            schedule_id: Uuid::new_v4(),
            created_at,
            season_at_creation,
            initial_portfolio,
            target_weights,
            orders,
            status: ScheduleStatus::Active,
        }
    }

    /// `Completed` once every order is terminal and at least one completed;
    /// `Failed` if every order failed.
    pub fn reconcile_completion(&mut self) {
        if self.status != ScheduleStatus::Active {
            return;
        }
        if !self.orders.iter().all(|o| o.status.is_terminal()) {
            return;
        }
        let any_completed = self
            .orders
            .iter()
            .any(|o| o.status == TwapOrderStatus::Completed);
        self.status = if any_completed {
            ScheduleStatus::Completed
        } else {
            ScheduleStatus::Failed
        };
    }

    pub fn mark_cancelled(&mut self) {
        for order in &mut self.orders {
            order.mark_cancelled();
        }
        self.status = ScheduleStatus::Cancelled;
    }

    pub fn order_mut(&mut self, asset: Asset) -> Option<&mut TwapOrder> {
        self.orders.iter_mut().find(|o| o.asset == asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::TargetWeights;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn ts(h: i64) -> Timestamp {
        chrono::Utc.timestamp_opt(1_700_000_000 + h * 3600, 0).unwrap()
    }

    fn weights() -> TargetWeights {
        let mut m = BTreeMap::new();
        m.insert(Asset::Krw, rust_decimal::Decimal::ONE);
        TargetWeights::new(m).unwrap()
    }

    #[test]
    fn last_slice_absorbs_remainder() {
        let order = TwapOrder::new(
            Asset::Btc,
            Side::Sell,
            Krw(1_000_000),
            3,
            Duration::minutes(30),
            ts(0),
        );
        // 1_000_000 / 3 = 333_333, remainder goes to slice 3
        assert_eq!(order.notional_for_slice(1), Krw(333_333));
        assert_eq!(order.notional_for_slice(2), Krw(333_333));
        assert_eq!(order.notional_for_slice(3), Krw(333_334));
        let sum: i64 = (1..=3).map(|n| order.notional_for_slice(n).0).sum();
        assert_eq!(sum, 1_000_000);
    }

    #[test]
    fn due_predicate_respects_interval() {
        let order = TwapOrder::new(
            Asset::Btc,
            Side::Sell,
            Krw(900_000),
            3,
            Duration::minutes(30),
            ts(0),
        );
        assert!(order.is_due(ts(0)));
        assert!(!order.is_due(ts(0) - Duration::minutes(1)));
    }

    #[test]
    fn execution_decrements_remaining_and_advances_count() {
        let mut order = TwapOrder::new(
            Asset::Btc,
            Side::Sell,
            Krw(900_000),
            3,
            Duration::minutes(30),
            ts(0),
        );
        order.record_execution("ex-1".into(), Krw(300_000), ts(0));
        assert_eq!(order.executed_slices, 1);
        assert_eq!(order.remaining_krw, Krw(600_000));
        assert_eq!(order.status, TwapOrderStatus::Executing);
    }

    #[test]
    fn order_completes_when_all_slices_executed() {
        let mut order = TwapOrder::new(
            Asset::Btc,
            Side::Sell,
            Krw(300_000),
            1,
            Duration::minutes(30),
            ts(0),
        );
        order.record_execution("ex-1".into(), Krw(300_000), ts(0));
        assert_eq!(order.status, TwapOrderStatus::Completed);
    }

    #[test]
    fn schedule_completes_when_any_order_completes_and_rest_terminal() {
        let mut schedule = TwapSchedule::new(
            ts(0),
            Season::RiskOn,
            weights(),
            Portfolio::new(BTreeMap::new()),
            vec![
                TwapOrder::new(Asset::Btc, Side::Sell, Krw(300_000), 1, Duration::minutes(30), ts(0)),
                TwapOrder::new(Asset::Eth, Side::Sell, Krw(300_000), 1, Duration::minutes(30), ts(0)),
            ],
        );
        schedule.order_mut(Asset::Btc).unwrap().record_execution("ex-1".into(), Krw(300_000), ts(0));
        schedule.order_mut(Asset::Eth).unwrap().mark_failed();
        schedule.reconcile_completion();
        assert_eq!(schedule.status, ScheduleStatus::Completed);
    }
}
