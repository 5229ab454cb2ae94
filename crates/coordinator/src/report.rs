use uuid::Uuid;

use kairos_core::{Asset, Krw, Season, ScheduleStatus, Timestamp};
use kairos_scheduler::{DriftReason, SliceOutcome};

/// What a single `tick()` did to the active schedule, if anything.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleAction {
    /// No active schedule existed and the planner produced nothing to trade.
    Idle,
    /// A fresh schedule was built and persisted.
    Started { schedule_id: Uuid },
    /// The active schedule's due slices were placed.
    Advanced { schedule_id: Uuid },
    /// The active schedule was cancelled and superseded by a new one.
    Replaced {
        old_schedule_id: Uuid,
        new_schedule_id: Uuid,
    },
}

/// What one `tick()` observed and did. Per-order states and the last error
/// per order live in `slice_outcomes`; `status()` exposes the durable view.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub at: Timestamp,
    pub season: Season,
    pub season_changed: bool,
    pub drift_reasons: Vec<DriftReason>,
    pub action: ScheduleAction,
    pub slice_outcomes: Vec<(Asset, SliceOutcome)>,
}

/// Progress of one `TwapOrder` within the active schedule, for `status()`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderProgress {
    pub asset: Asset,
    pub executed_slices: u32,
    pub slice_count: u32,
    pub remaining_krw: Krw,
    /// Earliest time the next due slice can be placed, if the order has one.
    pub next_slice_due_at: Option<Timestamp>,
}

/// Read-only snapshot of the active schedule, or `None` if there isn't one.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerStatus {
    pub schedule_id: Option<Uuid>,
    pub status: Option<ScheduleStatus>,
    pub season: Option<Season>,
    pub orders: Vec<OrderProgress>,
}

impl SchedulerStatus {
    pub fn empty() -> Self {
        Self {
            schedule_id: None,
            status: None,
            season: None,
            orders: Vec::new(),
        }
    }
}

/// Optional observer notified after every `tick()`. Zero observers are
/// registered by a default `ExecutionCoordinator` — the core does no
/// logging beyond the structured `tracing` spans and the store's audit
/// table; a collaborating notification layer plugs in here instead.
pub trait Observer: Send + Sync {
    fn observe(&self, report: &TickReport);
}
