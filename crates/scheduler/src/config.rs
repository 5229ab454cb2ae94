use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use kairos_core::Krw;

/// Execution parameters for the scheduler. Defaults mirror the
/// configuration surface's recognized keys.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// External tick cadence the scheduler is driven at.
    pub tick_cadence: Duration,
    /// Target-weight delta beyond which a schedule is considered drifted.
    pub drift_threshold: Decimal,
    /// Minimum implied KRW gap for the "already off target now" drift check.
    pub drift_min_gap_krw: Krw,
    /// Minimum time between two drift evaluations of the same schedule.
    pub drift_cooldown: Duration,
    /// Age beyond which a schedule is replaced regardless of drift.
    pub execution_timeout: Duration,
    /// Grace period after cancelling residual orders in a replacement,
    /// before re-planning against fresh balances. Configurable per
    /// the spec's open question about whether a fixed 5s is sufficient.
    pub replacement_grace_period: Duration,
    /// Smallest KRW amount the planner will emit an order for; also used
    /// to accept a short-filled last slice as `Completed`.
    pub min_notional: Krw,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_cadence: Duration::minutes(15),
            drift_threshold: dec!(0.03),
            drift_min_gap_krw: Krw(20_000),
            drift_cooldown: Duration::minutes(30),
            execution_timeout: Duration::hours(24),
            replacement_grace_period: Duration::seconds(5),
            min_notional: Krw(10_000),
        }
    }
}
