use serde::{Deserialize, Serialize};

use crate::{Krw, Timestamp};

/// Market season: the regime the classifier assigns BTC to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    RiskOn,
    RiskOff,
    Neutral,
}

impl std::fmt::Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Season::RiskOn => "RiskOn",
            Season::RiskOff => "RiskOff",
            Season::Neutral => "Neutral",
        })
    }
}

/// Append-only log entry recording a classifier evaluation. Used as the
/// source of "previous season" for hysteresis and for change detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonRecord {
    pub at: Timestamp,
    pub season: Season,
    pub btc_price: Krw,
    pub btc_ma_200w: Krw,
}
