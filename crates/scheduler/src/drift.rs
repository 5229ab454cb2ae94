use rust_decimal::Decimal;

use kairos_core::{Asset, Krw, Portfolio, Season, TargetWeights, TwapSchedule};

use crate::config::SchedulerConfig;

/// A single reason a schedule was judged to have drifted from the market
/// state it was created against. All triggering reasons are evaluated and
/// returned, not just the first (per the spec's resolution of the
/// upstream prototype's ambiguous short-circuit behavior).
#[derive(Debug, Clone, PartialEq)]
pub enum DriftReason {
    SeasonChanged { from: Season, to: Season },
    TargetWeightChanged { asset: Asset, delta: Decimal },
    Timeout,
}

/// Evaluate every drift trigger in spec.md §4.6.4 against a schedule's
/// captured state. Does not consult or update cooldown — the caller is
/// responsible for only invoking this once per `drift_cooldown`.
pub fn detect_drift(
    schedule: &TwapSchedule,
    current_season: Season,
    new_targets: &TargetWeights,
    portfolio: &Portfolio,
    now: kairos_core::Timestamp,
    config: &SchedulerConfig,
) -> Vec<DriftReason> {
    let mut reasons = Vec::new();

    if schedule.season_at_creation != current_season {
        reasons.push(DriftReason::SeasonChanged {
            from: schedule.season_at_creation,
            to: current_season,
        });
    }

    for asset in Asset::CRYPTO {
        let old_w = schedule.target_weights.get(asset);
        let new_w = new_targets.get(asset);
        let target_delta = (new_w - old_w).abs();

        if target_delta > config.drift_threshold {
            reasons.push(DriftReason::TargetWeightChanged {
                asset,
                delta: target_delta,
            });
            continue;
        }

        let current_w = portfolio.current_weight(asset);
        let off_by = (current_w - new_w).abs();
        if off_by > config.drift_threshold {
            let gap_krw = Krw((off_by * Decimal::from(portfolio.total_krw.0))
                .round()
                .try_into()
                .unwrap_or(i64::MAX));
            if gap_krw > config.drift_min_gap_krw {
                reasons.push(DriftReason::TargetWeightChanged {
                    asset,
                    delta: off_by,
                });
            }
        }
    }

    if now - schedule.created_at > config.execution_timeout {
        reasons.push(DriftReason::Timeout);
    }

    reasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn ts(secs: i64) -> kairos_core::Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn targets(btc: Decimal, krw: Decimal) -> TargetWeights {
        let mut m = BTreeMap::new();
        m.insert(Asset::Btc, btc);
        m.insert(Asset::Krw, krw);
        TargetWeights::new(m).unwrap()
    }

    fn schedule_with(season: Season, targets: TargetWeights, created_at: kairos_core::Timestamp) -> TwapSchedule {
        TwapSchedule::new(created_at, season, targets, Portfolio::new(BTreeMap::new()), vec![])
    }

    fn portfolio_with_btc_weight(w: Decimal) -> Portfolio {
        let mut m = BTreeMap::new();
        let total = 100_000_000i64;
        let btc_value = (w * Decimal::from(total)).round().try_into().unwrap_or(0i64);
        m.insert(Asset::Btc, kairos_core::Holding::new(dec!(1), Krw(btc_value)));
        m.insert(Asset::Krw, kairos_core::Holding::krw(Krw(total - btc_value)));
        Portfolio::new(m)
    }

    #[test]
    fn season_change_is_a_drift_reason() {
        let schedule = schedule_with(Season::RiskOn, targets(dec!(0.3), dec!(0.7)), ts(0));
        let reasons = detect_drift(
            &schedule,
            Season::RiskOff,
            &targets(dec!(0.3), dec!(0.7)),
            &portfolio_with_btc_weight(dec!(0.3)),
            ts(100),
            &SchedulerConfig::default(),
        );
        assert!(reasons
            .iter()
            .any(|r| matches!(r, DriftReason::SeasonChanged { .. })));
    }

    #[test]
    fn large_target_weight_change_is_a_drift_reason() {
        let schedule = schedule_with(Season::RiskOn, targets(dec!(0.30), dec!(0.70)), ts(0));
        let reasons = detect_drift(
            &schedule,
            Season::RiskOn,
            &targets(dec!(0.40), dec!(0.60)),
            &portfolio_with_btc_weight(dec!(0.30)),
            ts(100),
            &SchedulerConfig::default(),
        );
        assert!(reasons
            .iter()
            .any(|r| matches!(r, DriftReason::TargetWeightChanged { asset: Asset::Btc, .. })));
    }

    #[test]
    fn small_weight_change_near_target_does_not_drift() {
        let schedule = schedule_with(Season::RiskOn, targets(dec!(0.30), dec!(0.70)), ts(0));
        let reasons = detect_drift(
            &schedule,
            Season::RiskOn,
            &targets(dec!(0.31), dec!(0.69)),
            &portfolio_with_btc_weight(dec!(0.305)),
            ts(100),
            &SchedulerConfig::default(),
        );
        assert!(reasons.is_empty());
    }

    #[test]
    fn timeout_triggers_after_execution_timeout() {
        let schedule = schedule_with(Season::RiskOn, targets(dec!(0.30), dec!(0.70)), ts(0));
        let config = SchedulerConfig::default();
        let reasons = detect_drift(
            &schedule,
            Season::RiskOn,
            &targets(dec!(0.30), dec!(0.70)),
            &portfolio_with_btc_weight(dec!(0.30)),
            ts(0) + config.execution_timeout + chrono::Duration::seconds(1),
            &config,
        );
        assert!(reasons.iter().any(|r| matches!(r, DriftReason::Timeout)));
    }
}
