use kairos_core::{Portfolio, RebalanceOrder, Season, TargetWeights, Timestamp, TwapOrder, TwapSchedule};

use crate::volatility::SlicingParams;

/// Build a fresh `TwapSchedule` from a rebalance plan. The plan is assumed
/// already ordered sells-first-then-buys (the planner's contract); order
/// within the schedule mirrors the plan's order exactly, which is also
/// the serialized placement order within a tick. `initial_portfolio` is
/// the priced snapshot the plan was built against, carried for the
/// eventual `RebalanceAudit`.
pub fn build_schedule(
    plan: &[RebalanceOrder],
    season: Season,
    target_weights: TargetWeights,
    initial_portfolio: Portfolio,
    slicing: SlicingParams,
    now: Timestamp,
) -> TwapSchedule {
    let orders = plan
        .iter()
        .map(|leg| {
            TwapOrder::new(
                leg.asset,
                leg.side,
                leg.total_krw,
                slicing.slice_count,
                slicing.slice_interval,
                now,
            )
        })
        .collect();

    TwapSchedule::new(now, season, target_weights, initial_portfolio, orders)
}
