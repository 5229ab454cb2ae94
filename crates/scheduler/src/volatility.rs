//! Volatility signal and slicing-parameter derivation.
//!
//! The ATR computation here is a simplified average-true-range over daily
//! closes (no OHLC bars are part of this system's `PriceHistoryProvider`
//! contract, only closing prices) — true range is approximated as the
//! absolute close-to-close change, averaged over the window. See
//! DESIGN.md for why this departs from the upstream prototype's
//! exponentially-weighted ATR.

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use kairos_core::Krw;

/// Window, in days, for the ATR volatility signal.
pub const ATR_PERIOD_DAYS: usize = 14;

/// Volatility threshold separating Stable from Volatile markets.
pub const VOLATILITY_THRESHOLD: Decimal = dec!(0.05);

pub const STABLE_EXECUTION_HOURS: i64 = 6;
pub const STABLE_SLICE_COUNT: u32 = 12;
pub const VOLATILE_EXECUTION_HOURS: i64 = 24;
pub const VOLATILE_SLICE_COUNT: u32 = 24;

pub const MIN_SLICE_COUNT: u32 = 4;
pub const MAX_SLICE_COUNT: u32 = 48;

/// Average True Range over `daily_closes`, expressed as a fraction of the
/// most recent close. Returns `0` if fewer than two closes are available.
pub fn atr_relative(daily_closes: &[Krw]) -> Decimal {
    if daily_closes.len() < 2 {
        return Decimal::ZERO;
    }
    let window_start = daily_closes.len().saturating_sub(ATR_PERIOD_DAYS + 1);
    let window = &daily_closes[window_start..];

    let true_ranges: Vec<Decimal> = window
        .windows(2)
        .map(|pair| Decimal::from((pair[1].0 - pair[0].0).abs()))
        .collect();
    if true_ranges.is_empty() {
        return Decimal::ZERO;
    }
    let sum: Decimal = true_ranges.iter().sum();
    let atr = sum / Decimal::from(true_ranges.len());

    let current_price = daily_closes.last().unwrap().0;
    if current_price <= 0 {
        return Decimal::ZERO;
    }
    atr / Decimal::from(current_price)
}

/// Derived slicing parameters for a `TwapOrder`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlicingParams {
    pub slice_count: u32,
    pub slice_interval: Duration,
}

/// Translate a relative-ATR volatility signal into slicing parameters,
/// aligning the slice interval to the external tick cadence and keeping
/// `slice_count` within `[4, 48]`.
pub fn slicing_params(relative_atr: Decimal, tick_cadence: Duration) -> SlicingParams {
    let (execution_hours, base_slice_count) = if relative_atr <= VOLATILITY_THRESHOLD {
        (STABLE_EXECUTION_HOURS, STABLE_SLICE_COUNT)
    } else {
        (VOLATILE_EXECUTION_HOURS, VOLATILE_SLICE_COUNT)
    };

    let total_minutes = execution_hours * 60;
    let even_interval_minutes = total_minutes / base_slice_count as i64;
    let tick_minutes = tick_cadence.num_minutes().max(1);
    let slice_interval_minutes = even_interval_minutes.max(tick_minutes);

    let mut slice_count = ((total_minutes as f64) / (slice_interval_minutes as f64)).round() as u32;
    slice_count = slice_count.clamp(MIN_SLICE_COUNT, MAX_SLICE_COUNT);

    SlicingParams {
        slice_count,
        slice_interval: Duration::minutes(slice_interval_minutes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_volatility_yields_six_hour_twelve_slice_plan() {
        // Scenario B: vol = 3%, default 15-minute tick cadence.
        let params = slicing_params(dec!(0.03), Duration::minutes(15));
        assert_eq!(params.slice_count, 12);
        assert_eq!(params.slice_interval, Duration::minutes(30));
    }

    #[test]
    fn volatile_market_yields_twenty_four_hour_plan() {
        let params = slicing_params(dec!(0.08), Duration::minutes(15));
        assert_eq!(params.slice_count, 24);
        assert_eq!(params.slice_interval, Duration::minutes(60));
    }

    #[test]
    fn slice_count_never_exceeds_bounds() {
        // A very long tick cadence would otherwise push slice_count below 4.
        let params = slicing_params(dec!(0.03), Duration::hours(3));
        assert!(params.slice_count >= MIN_SLICE_COUNT);
        assert!(params.slice_count <= MAX_SLICE_COUNT);
    }

    #[test]
    fn atr_relative_is_zero_with_insufficient_data() {
        assert_eq!(atr_relative(&[Krw(1_000)]), Decimal::ZERO);
        assert_eq!(atr_relative(&[]), Decimal::ZERO);
    }

    #[test]
    fn atr_relative_reflects_price_swings() {
        let closes: Vec<Krw> = vec![50_000_000, 51_000_000, 49_000_000, 50_500_000]
            .into_iter()
            .map(Krw)
            .collect();
        let atr = atr_relative(&closes);
        assert!(atr > Decimal::ZERO);
    }
}
