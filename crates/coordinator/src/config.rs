use rust_decimal::Decimal;

use kairos_core::{IntraCryptoAllocation, Krw};

/// Coordinator-level configuration: the classifier/planner keys from the
/// configuration surface that `kairos_scheduler::SchedulerConfig` doesn't
/// already own.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub intra_crypto: IntraCryptoAllocation,
    pub buffer_band: Decimal,
    pub min_notional: Krw,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            intra_crypto: IntraCryptoAllocation::default(),
            buffer_band: kairos_classifier::DEFAULT_BUFFER_BAND,
            min_notional: kairos_planner::DEFAULT_MIN_NOTIONAL,
        }
    }
}
