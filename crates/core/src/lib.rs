//! Kairos Core Domain
//!
//! Pure domain types for the Kairos rebalancing engine: assets, portfolios,
//! target weights, rebalance orders, and the TWAP schedule state machine.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod asset;
pub mod audit;
pub mod error;
pub mod krw;
pub mod portfolio;
pub mod rebalance;
pub mod schedule;
pub mod season;
pub mod weights;

pub use asset::{Asset, Side};
pub use audit::{OrderOutcome, RebalanceAudit};
pub use error::DomainError;
pub use krw::Krw;
pub use portfolio::{Holding, Portfolio};
pub use rebalance::RebalanceOrder;
pub use schedule::{
    ExchangeOrderId, ExchangeOrderRecord, ScheduleStatus, TwapOrder, TwapOrderStatus, TwapSchedule,
};
pub use season::{Season, SeasonRecord};
pub use weights::{IntraCryptoAllocation, TargetWeights};

/// Timestamp in UTC, matching the precision the rest of the system expects.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
