use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use kairos_core::{Krw, Season};

/// Default hysteresis band: ±5% around the 200-week moving average.
pub const DEFAULT_BUFFER_BAND: Decimal = dec!(0.05);

/// Determine the market season from current BTC price, its 200-week
/// moving average, and the previously persisted season (used for
/// hysteresis inside the buffer band).
///
/// The band is closed at its outer edges: `ratio == 1 + buffer` is
/// `RiskOn`, `ratio == 1 - buffer` is `RiskOff`.
///
/// Returns `Neutral` and logs a diagnostic if either input is
/// non-positive — the classifier never panics or divides by zero.
pub fn classify_season(
    current_price: Krw,
    ma_200w: Krw,
    previous_season: Option<Season>,
    buffer_band: Decimal,
) -> Season {
    if current_price.0 <= 0 || ma_200w.0 <= 0 {
        tracing::warn!(
            price = current_price.0,
            ma_200w = ma_200w.0,
            "invalid classifier input, defaulting to Neutral"
        );
        return Season::Neutral;
    }

    let ratio = Decimal::from(current_price.0) / Decimal::from(ma_200w.0);
    let risk_on_threshold = Decimal::ONE + buffer_band;
    let risk_off_threshold = Decimal::ONE - buffer_band;

    if ratio >= risk_on_threshold {
        Season::RiskOn
    } else if ratio <= risk_off_threshold {
        Season::RiskOff
    } else {
        previous_season.unwrap_or(Season::Neutral)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_on_above_buffer() {
        let season = classify_season(Krw(55_000_000), Krw(50_000_000), None, DEFAULT_BUFFER_BAND);
        assert_eq!(season, Season::RiskOn);
    }

    #[test]
    fn risk_off_below_buffer() {
        // Scenario A from the spec: ratio 0.9, prior season RiskOn.
        let season = classify_season(
            Krw(45_000_000),
            Krw(50_000_000),
            Some(Season::RiskOn),
            DEFAULT_BUFFER_BAND,
        );
        assert_eq!(season, Season::RiskOff);
    }

    #[test]
    fn neutral_band_retains_previous_season() {
        // Scenario F: ratio 1.03, within +-5%, previous season RiskOff.
        let season = classify_season(
            Krw(51_500_000),
            Krw(50_000_000),
            Some(Season::RiskOff),
            DEFAULT_BUFFER_BAND,
        );
        assert_eq!(season, Season::RiskOff);
    }

    #[test]
    fn neutral_band_with_no_previous_season_is_neutral() {
        let season = classify_season(Krw(51_500_000), Krw(50_000_000), None, DEFAULT_BUFFER_BAND);
        assert_eq!(season, Season::Neutral);
    }

    #[test]
    fn boundary_is_closed_at_outer_edges() {
        // Exactly +5%.
        let season = classify_season(Krw(52_500_000), Krw(50_000_000), None, DEFAULT_BUFFER_BAND);
        assert_eq!(season, Season::RiskOn);
        // Exactly -5%.
        let season = classify_season(Krw(47_500_000), Krw(50_000_000), None, DEFAULT_BUFFER_BAND);
        assert_eq!(season, Season::RiskOff);
    }

    #[test]
    fn non_positive_inputs_are_neutral() {
        assert_eq!(
            classify_season(Krw(0), Krw(50_000_000), Some(Season::RiskOn), DEFAULT_BUFFER_BAND),
            Season::Neutral
        );
        assert_eq!(
            classify_season(Krw(50_000_000), Krw(0), Some(Season::RiskOn), DEFAULT_BUFFER_BAND),
            Season::Neutral
        );
    }

    #[test]
    fn classification_is_a_pure_function_of_its_inputs() {
        let a = classify_season(Krw(45_000_000), Krw(50_000_000), Some(Season::RiskOn), DEFAULT_BUFFER_BAND);
        let b = classify_season(Krw(45_000_000), Krw(50_000_000), Some(Season::RiskOn), DEFAULT_BUFFER_BAND);
        assert_eq!(a, b);
    }
}
