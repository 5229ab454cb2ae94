//! Kairos Planner
//!
//! Diffs current holdings (valued in KRW) against target weights and
//! emits the signed per-asset KRW deltas that need to be traded, filtered
//! by `min_notional`. Never places an order — it only returns a plan.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use kairos_core::{Asset, Krw, Portfolio, RebalanceOrder, Side, TargetWeights};

/// Smallest KRW amount for which the planner will emit an order.
pub const DEFAULT_MIN_NOTIONAL: Krw = Krw(10_000);

/// Build a rebalance plan: the signed KRW deltas per asset needed to move
/// `portfolio` toward `targets`, ordered sells-first then buys, each group
/// in ascending `Asset` order (BTC, ETH, XRP, SOL).
///
/// Returns an empty plan (never an error) if the portfolio has zero total
/// value — there is nothing to divide a weight by.
pub fn plan_rebalance(
    portfolio: &Portfolio,
    targets: &TargetWeights,
    min_notional: Krw,
) -> Vec<RebalanceOrder> {
    if portfolio.total_krw.0 == 0 {
        return Vec::new();
    }

    let total = Decimal::from(portfolio.total_krw.0);
    let mut orders: Vec<RebalanceOrder> = Asset::CRYPTO
        .iter()
        .filter_map(|&asset| {
            let current_w = portfolio.current_weight(asset);
            let target_w = targets.get(asset);
            let delta_krw = (target_w - current_w) * total;
            let delta_i64 = delta_krw.round().to_i64().unwrap_or(0);

            if delta_i64.unsigned_abs() < min_notional.0 as u64 {
                return None;
            }
            let side = if delta_i64 > 0 { Side::Buy } else { Side::Sell };
            Some(RebalanceOrder::new(asset, side, Krw(delta_i64.abs())))
        })
        .collect();

    // Sells first (free cash before spending it), then buys; within each
    // group, ascending Asset declaration order.
    orders.sort_by_key(|o| (o.side == Side::Buy, o.asset));
    orders
}
