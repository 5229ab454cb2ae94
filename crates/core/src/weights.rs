use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::asset::Asset;
use crate::error::DomainError;

/// Tolerance used whenever a set of weights is required to sum to 1.
pub const WEIGHT_SUM_TOLERANCE: Decimal = dec!(0.000001);

/// Fixed configuration weights for the crypto portion of the portfolio.
/// Validated once at startup — failure is a configuration error, not a
/// runtime one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntraCryptoAllocation {
    pub btc: Decimal,
    pub eth: Decimal,
    pub xrp: Decimal,
    pub sol: Decimal,
}

impl IntraCryptoAllocation {
    pub fn new(btc: Decimal, eth: Decimal, xrp: Decimal, sol: Decimal) -> Result<Self, DomainError> {
        let allocation = Self { btc, eth, xrp, sol };
        allocation.validate()?;
        Ok(allocation)
    }

    pub fn weight(&self, asset: Asset) -> Decimal {
        match asset {
            Asset::Btc => self.btc,
            Asset::Eth => self.eth,
            Asset::Xrp => self.xrp,
            Asset::Sol => self.sol,
            Asset::Krw => Decimal::ZERO,
        }
    }

    fn validate(&self) -> Result<(), DomainError> {
        for (asset, w) in [
            (Asset::Btc, self.btc),
            (Asset::Eth, self.eth),
            (Asset::Xrp, self.xrp),
            (Asset::Sol, self.sol),
        ] {
            if w < Decimal::ZERO || w > Decimal::ONE {
                return Err(DomainError::WeightOutOfRange { asset, weight: w });
            }
        }
        let sum = self.btc + self.eth + self.xrp + self.sol;
        if (sum - Decimal::ONE).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(DomainError::WeightsDoNotSumToOne { sum });
        }
        Ok(())
    }
}

impl Default for IntraCryptoAllocation {
    /// The default intra-crypto split named in the configuration surface:
    /// BTC 0.40 / ETH 0.30 / XRP 0.15 / SOL 0.15.
    fn default() -> Self {
        Self {
            btc: dec!(0.40),
            eth: dec!(0.30),
            xrp: dec!(0.15),
            sol: dec!(0.15),
        }
    }
}

/// A validated weight map over `{BTC, ETH, XRP, SOL, KRW}` summing to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetWeights(BTreeMap<Asset, Decimal>);

impl TargetWeights {
    pub fn new(weights: BTreeMap<Asset, Decimal>) -> Result<Self, DomainError> {
        let mut sum = Decimal::ZERO;
        for (&asset, &w) in &weights {
            if w < Decimal::ZERO || w > Decimal::ONE {
                return Err(DomainError::WeightOutOfRange { asset, weight: w });
            }
            sum += w;
        }
        if (sum - Decimal::ONE).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(DomainError::WeightsDoNotSumToOne { sum });
        }
        Ok(Self(weights))
    }

    pub fn get(&self, asset: Asset) -> Decimal {
        self.0.get(&asset).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Asset, Decimal)> + '_ {
        self.0.iter().map(|(&a, &w)| (a, w))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_intra_allocation_sums_to_one() {
        let allocation = IntraCryptoAllocation::default();
        assert!(allocation.validate().is_ok());
    }

    #[test]
    fn rejects_allocation_not_summing_to_one() {
        let err = IntraCryptoAllocation::new(dec!(0.5), dec!(0.3), dec!(0.15), dec!(0.15));
        assert!(matches!(err, Err(DomainError::WeightsDoNotSumToOne { .. })));
    }

    #[test]
    fn target_weights_reject_bad_sum() {
        let mut map = BTreeMap::new();
        map.insert(Asset::Btc, dec!(0.5));
        map.insert(Asset::Krw, dec!(0.4));
        assert!(matches!(
            TargetWeights::new(map),
            Err(DomainError::WeightsDoNotSumToOne { .. })
        ));
    }

    #[test]
    fn target_weights_accept_valid_sum() {
        let mut map = BTreeMap::new();
        map.insert(Asset::Btc, dec!(0.6));
        map.insert(Asset::Krw, dec!(0.4));
        let weights = TargetWeights::new(map).unwrap();
        assert_eq!(weights.get(Asset::Btc), dec!(0.6));
        assert_eq!(weights.get(Asset::Eth), Decimal::ZERO);
    }
}
