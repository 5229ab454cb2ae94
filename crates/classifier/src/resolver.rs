use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use kairos_core::error::DomainError;
use kairos_core::{Asset, IntraCryptoAllocation, Season, TargetWeights};

/// `(crypto_weight, krw_weight)` for each season.
fn season_split(season: Season) -> (Decimal, Decimal) {
    match season {
        Season::RiskOn => (dec!(0.70), dec!(0.30)),
        Season::RiskOff => (dec!(0.30), dec!(0.70)),
        Season::Neutral => (dec!(0.50), dec!(0.50)),
    }
}

/// Compose the season's crypto/cash split with the fixed intra-crypto
/// allocation into a full target weight map.
pub fn resolve_targets(
    season: Season,
    intra: IntraCryptoAllocation,
) -> Result<TargetWeights, DomainError> {
    let (crypto_w, krw_w) = season_split(season);

    let mut weights = BTreeMap::new();
    weights.insert(Asset::Krw, krw_w);
    for asset in Asset::CRYPTO {
        weights.insert(asset, crypto_w * intra.weight(asset));
    }

    TargetWeights::new(weights)
}
