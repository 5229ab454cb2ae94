//! Shared pre-placement validation and sizing, used by every
//! `ExchangeAdapter` implementation in this crate.
//!
//! Grounded on `original_source/src/trading/coinone_client.py`'s
//! `place_safe_order`/`_validate_balance`/`_adjust_order_size`: validate
//! balance with a safety margin, downscale and retry on the exchange's
//! per-asset maximum, reject outright below the exchange minimum.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use kairos_core::{Asset, Krw};
use kairos_ports::ExchangeError;

/// Exchange-side order bounds and retry policy. Defaults mirror the
/// per-asset KRW limits the upstream Python client hard-codes.
#[derive(Debug, Clone)]
pub struct AdapterLimits {
    pub max_order_krw: BTreeMap<Asset, Krw>,
    pub min_order_krw: Krw,
    pub max_retries: u32,
    /// Fractional safety margin required on top of the requested notional
    /// when checking balance sufficiency (spec §4.1: "1% safety margin").
    pub safety_margin: Decimal,
}

impl Default for AdapterLimits {
    fn default() -> Self {
        let mut max_order_krw = BTreeMap::new();
        max_order_krw.insert(Asset::Btc, Krw(10_000_000));
        max_order_krw.insert(Asset::Eth, Krw(10_000_000));
        max_order_krw.insert(Asset::Xrp, Krw(5_000_000));
        max_order_krw.insert(Asset::Sol, Krw(5_000_000));
        Self {
            max_order_krw,
            min_order_krw: Krw(5_000),
            max_retries: 3,
            safety_margin: dec!(0.01),
        }
    }
}

impl AdapterLimits {
    fn max_for(&self, asset: Asset) -> Krw {
        self.max_order_krw
            .get(&asset)
            .copied()
            .unwrap_or(Krw(1_000_000))
    }

    /// Validate and, if necessary, downscale `requested` against
    /// `available_krw` (the caller's balance available for this side,
    /// expressed in KRW) until it clears both the exchange maximum and a
    /// balance check with `safety_margin` headroom, or the retry budget
    /// is exhausted.
    ///
    /// Returns the (possibly shrunk) notional to place, or the terminal
    /// error the caller should propagate.
    pub fn size_order(
        &self,
        asset: Asset,
        requested: Krw,
        available_krw: Krw,
    ) -> Result<Krw, ExchangeError> {
        let max_limit = self.max_for(asset);
        let mut notional = requested;

        for _ in 0..=self.max_retries {
            if notional < self.min_order_krw {
                return Err(ExchangeError::NotionalBelowMin(format!(
                    "{notional} below exchange minimum {} for {asset}",
                    self.min_order_krw
                )));
            }

            if notional > max_limit {
                notional = Krw((Decimal::from(max_limit.0) * dec!(0.5))
                    .round()
                    .try_into()
                    .unwrap_or(max_limit.0));
                continue;
            }

            let required = Decimal::from(notional.0) * (Decimal::ONE + self.safety_margin);
            let required_krw = required.round().try_into().unwrap_or(i64::MAX);
            if available_krw.0 < required_krw {
                notional = Krw((Decimal::from(notional.0) * dec!(0.9))
                    .round()
                    .try_into()
                    .unwrap_or(0));
                continue;
            }

            return Ok(notional);
        }

        Err(ExchangeError::InsufficientBalance(format!(
            "could not size an order for {asset} within available balance {available_krw} after {} retries",
            self.max_retries
        )))
    }
}
