use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::asset::{Asset, Side};
use crate::krw::Krw;
use crate::portfolio::Portfolio;
use crate::schedule::TwapOrderStatus;
use crate::Timestamp;

/// Per-`TwapOrder` outcome recorded once a schedule terminates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderOutcome {
    pub asset: Asset,
    pub side: Side,
    pub total_krw: Krw,
    pub executed_krw: Krw,
    pub status: TwapOrderStatus,
}

/// One record per completed (or terminally failed) schedule, with the
/// initial/final portfolio snapshot and per-order outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceAudit {
    pub schedule_id: Uuid,
    pub started_at: Timestamp,
    pub ended_at: Timestamp,
    pub initial_portfolio: Portfolio,
    pub final_portfolio: Portfolio,
    pub outcomes: Vec<OrderOutcome>,
}

impl RebalanceAudit {
    pub fn failures(&self) -> impl Iterator<Item = &OrderOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == TwapOrderStatus::Failed)
    }
}
