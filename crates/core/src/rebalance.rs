use serde::{Deserialize, Serialize};

use crate::asset::{Asset, Side};
use crate::krw::Krw;

/// One leg of a rebalance plan: buy or sell a non-KRW asset for the given
/// notional. Produced only when the planner's delta clears `MIN_NOTIONAL`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RebalanceOrder {
    pub asset: Asset,
    pub side: Side,
    pub total_krw: Krw,
}

impl RebalanceOrder {
    pub fn new(asset: Asset, side: Side, total_krw: Krw) -> Self {
        debug_assert!(asset.is_crypto(), "RebalanceOrder cannot target KRW");
        debug_assert!(total_krw.0 > 0, "RebalanceOrder notional must be positive");
        Self {
            asset,
            side,
            total_krw,
        }
    }
}
