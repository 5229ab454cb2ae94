//! Persistent, crash-recoverable TWAP execution scheduler.
//!
//! `TwapScheduler` owns no clock of its own — every operation is
//! parameterized by `now`, supplied by the caller (the coordinator). This
//! mirrors the rest of the workspace, where only `kairos-clock` decides
//! what time it is.

pub mod build;
pub mod config;
pub mod drift;
pub mod error;
pub mod volatility;

use std::sync::Arc;

use rust_decimal::Decimal;

use kairos_core::{Asset, Krw, Portfolio, RebalanceOrder, Season, TargetWeights, Timestamp, TwapSchedule};
use kairos_ports::{ExchangeAdapter, ExchangeError, OrderType, Store};

pub use build::build_schedule;
pub use config::SchedulerConfig;
pub use drift::{detect_drift, DriftReason};
pub use error::SchedulerError;
pub use volatility::{atr_relative, slicing_params, SlicingParams};

/// What happened to one order's due slice during a single `advance` call.
#[derive(Debug, Clone, PartialEq)]
pub enum SliceOutcome {
    /// A slice was placed and (possibly partially) accounted for.
    Placed { filled_krw: Krw },
    /// The order was already in a terminal state; nothing to do.
    AlreadyTerminal,
    /// No slice is due yet for this order.
    NotDue,
    /// The exchange reported a transient condition; the slice remains due
    /// and will be retried on the next tick.
    Transient { reason: String },
    /// The last slice filled below the exchange minimum and the order was
    /// accepted as complete with its remainder unexecuted.
    ShortFillCompleted,
    /// The order was marked `Failed` (insufficient balance, notional above
    /// the exchange maximum, or a non-last slice below the minimum).
    Failed { reason: String },
}

fn client_order_id(schedule_id: uuid::Uuid, asset: Asset, slice_number: u32) -> String {
    format!("{schedule_id}-{asset}-{slice_number}")
}

/// Drives one `TwapSchedule` end to end: slice placement, drift-triggered
/// replacement, and crash recovery. Generic over the exchange adapter and
/// store so tests can substitute in-memory fakes.
pub struct TwapScheduler<E, S> {
    exchange: Arc<E>,
    store: Arc<S>,
    config: SchedulerConfig,
}

impl<E, S> TwapScheduler<E, S>
where
    E: ExchangeAdapter,
    S: Store,
{
    pub fn new(exchange: Arc<E>, store: Arc<S>, config: SchedulerConfig) -> Self {
        Self {
            exchange,
            store,
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Build and persist a fresh schedule from a rebalance plan. Persists
    /// before any exchange call is ever made against it.
    pub async fn start(
        &self,
        plan: &[RebalanceOrder],
        season: Season,
        target_weights: TargetWeights,
        initial_portfolio: Portfolio,
        relative_atr: Decimal,
        now: Timestamp,
    ) -> Result<TwapSchedule, SchedulerError> {
        let slicing = slicing_params(relative_atr, self.config.tick_cadence);
        let schedule = build_schedule(plan, season, target_weights, initial_portfolio, slicing, now);
        self.store.save_schedule(&schedule).await?;
        tracing::info!(
            schedule_id = %schedule.schedule_id,
            orders = schedule.orders.len(),
            slice_count = slicing.slice_count,
            "twap schedule started"
        );
        Ok(schedule)
    }

    /// Place every due slice, in order, and persist the resulting state.
    /// Orders are processed sequentially (never concurrently) so that a
    /// crash mid-tick leaves at most one order's placement unaccounted
    /// for, never a reordered fan-out.
    pub async fn advance(
        &self,
        schedule: &mut TwapSchedule,
        now: Timestamp,
    ) -> Result<Vec<(Asset, SliceOutcome)>, SchedulerError> {
        let mut outcomes = Vec::with_capacity(schedule.orders.len());

        for idx in 0..schedule.orders.len() {
            let asset = schedule.orders[idx].asset;
            let outcome = self.advance_one(schedule, idx, now).await?;
            outcomes.push((asset, outcome));
        }

        schedule.reconcile_completion();
        self.store.save_schedule(schedule).await?;
        Ok(outcomes)
    }

    async fn advance_one(
        &self,
        schedule: &mut TwapSchedule,
        idx: usize,
        now: Timestamp,
    ) -> Result<SliceOutcome, SchedulerError> {
        let (asset, side, notional, slice_number, is_last) = {
            let order = &schedule.orders[idx];
            if order.status.is_terminal() {
                return Ok(SliceOutcome::AlreadyTerminal);
            }
            if !order.is_due(now) {
                return Ok(SliceOutcome::NotDue);
            }
            let slice_number = order
                .next_slice_number()
                .expect("is_due implies a next slice exists");
            let notional = order.notional_for_slice(slice_number);
            (
                order.asset,
                order.side,
                notional,
                slice_number,
                slice_number == order.slice_count,
            )
        };

        let client_id = client_order_id(schedule.schedule_id, asset, slice_number);
        let result = self
            .exchange
            .place_order(&client_id, asset, side, notional, OrderType::Market, None)
            .await;

        let outcome = match result {
            Ok(placed) => {
                // Decrement by the actual fill when the exchange can report it
                // this soon after placement; fall back to the requested
                // notional when it can't (spec's "best-effort" fill accounting).
                let filled_krw = match self.exchange.get_order_status(&placed.order_id).await {
                    Ok(status) if status.filled_krw.0 > 0 => status.filled_krw,
                    _ => notional,
                };
                schedule.orders[idx].record_execution(placed.order_id, filled_krw, now);
                SliceOutcome::Placed { filled_krw }
            }
            Err(ExchangeError::InsufficientBalance(reason)) => {
                tracing::warn!(%asset, slice_number, %reason, "slice failed: insufficient balance");
                schedule.orders[idx].mark_failed();
                SliceOutcome::Failed { reason }
            }
            Err(ExchangeError::NotionalAboveMax(reason)) => {
                tracing::warn!(%asset, slice_number, %reason, "slice failed: notional above exchange max");
                schedule.orders[idx].mark_failed();
                SliceOutcome::Failed { reason }
            }
            Err(ExchangeError::NotionalBelowMin(reason)) if is_last => {
                tracing::info!(%asset, slice_number, %reason, "last slice below exchange minimum, accepting short fill");
                schedule.orders[idx].accept_short_fill(self.config.min_notional);
                SliceOutcome::ShortFillCompleted
            }
            Err(ExchangeError::NotionalBelowMin(reason)) => {
                tracing::warn!(%asset, slice_number, %reason, "slice failed: notional below exchange minimum");
                schedule.orders[idx].mark_failed();
                SliceOutcome::Failed { reason }
            }
            Err(ExchangeError::PriceUnavailable) => {
                SliceOutcome::Transient {
                    reason: "price unavailable".to_string(),
                }
            }
            Err(ExchangeError::Transient(reason)) => SliceOutcome::Transient { reason },
            Err(ExchangeError::Fatal(reason)) => {
                tracing::error!(%asset, slice_number, %reason, "fatal exchange error, halting");
                return Err(SchedulerError::Fatal(reason));
            }
        };

        Ok(outcome)
    }

    /// Cancel residual orders, wait out the grace period, then build and
    /// persist a replacement schedule against a fresh plan. Cancellation
    /// failures are logged, not propagated: a stray open order does not
    /// block re-planning. Returns `(cancelled_old_schedule, new_schedule)` —
    /// the caller needs the former to write its `RebalanceAudit`.
    pub async fn replace(
        &self,
        mut schedule: TwapSchedule,
        new_plan: &[RebalanceOrder],
        new_season: Season,
        new_target_weights: TargetWeights,
        new_initial_portfolio: Portfolio,
        relative_atr: Decimal,
        now: Timestamp,
    ) -> Result<(TwapSchedule, TwapSchedule), SchedulerError> {
        let residual_order_ids: Vec<_> = schedule
            .orders
            .iter()
            .filter(|o| !o.status.is_terminal())
            .flat_map(|o| o.exchange_order_ids.clone())
            .collect();

        schedule.mark_cancelled();

        for order_id in &residual_order_ids {
            if let Err(err) = self.exchange.cancel_order(order_id).await {
                tracing::warn!(%order_id, error = %err, "failed to cancel residual order during replacement");
            }
        }

        tokio::time::sleep(
            self.config
                .replacement_grace_period
                .to_std()
                .unwrap_or_default(),
        )
        .await;

        self.store.save_schedule(&schedule).await?;

        let slicing = slicing_params(relative_atr, self.config.tick_cadence);
        let new_schedule = build_schedule(
            new_plan,
            new_season,
            new_target_weights,
            new_initial_portfolio,
            slicing,
            now,
        );
        self.store.save_schedule(&new_schedule).await?;

        tracing::info!(
            old_schedule_id = %schedule.schedule_id,
            new_schedule_id = %new_schedule.schedule_id,
            "schedule replaced"
        );

        Ok((schedule, new_schedule))
    }

    /// Load the active schedule (if any) on startup and reconcile locally
    /// recorded orders against the exchange's view of them. An order whose
    /// last known exchange status is non-terminal is re-queried; a fill
    /// that happened after the last persist but before a crash is picked
    /// up here, and a slice genuinely still open is left alone for the
    /// next `advance` to either progress or supersede.
    ///
    /// The harder case — the exchange call for a slice succeeded but the
    /// process crashed before `save_schedule` recorded it — has no trace
    /// in the persisted schedule to reconcile against. It resolves itself
    /// on the next `advance`: the deterministic `client_order_id` makes
    /// the retried `place_order` idempotent, so the exchange returns the
    /// order that already exists instead of placing a duplicate.
    pub async fn recover(&self, now: Timestamp) -> Result<Option<TwapSchedule>, SchedulerError> {
        let Some(mut schedule) = self.store.load_active_schedule().await? else {
            return Ok(None);
        };

        for order in &mut schedule.orders {
            if order.status.is_terminal() {
                continue;
            }
            let Some(last_id) = order.exchange_order_ids.last().cloned() else {
                continue;
            };
            match self.exchange.get_order_status(&last_id).await {
                Ok(report) if report.state.is_terminal() => {
                    // Already accounted for at placement time in our model; a
                    // terminal status here just confirms the last persisted
                    // slice indeed went through.
                    let _ = report;
                }
                Ok(_) => {
                    tracing::info!(order_id = %last_id, asset = %order.asset, "recovered order still open at exchange");
                }
                Err(err) => {
                    tracing::warn!(order_id = %last_id, error = %err, "could not query order status during recovery");
                }
            }
        }

        self.store.save_schedule(&schedule).await?;
        tracing::info!(schedule_id = %schedule.schedule_id, %now, "recovered active schedule");
        Ok(Some(schedule))
    }
}

/// Decide whether a detected drift should actually trigger a replacement:
/// gates on the cooldown since the schedule's last drift evaluation.
pub fn should_replace(
    schedule: &TwapSchedule,
    reasons: &[DriftReason],
    now: Timestamp,
    config: &SchedulerConfig,
) -> bool {
    if reasons.is_empty() {
        return false;
    }
    let last_check = schedule
        .orders
        .iter()
        .filter_map(|o| o.last_drift_check_at)
        .max();
    match last_check {
        Some(last) => now - last >= config.drift_cooldown,
        None => true,
    }
}

/// Stamp every order's `last_drift_check_at` after an evaluation, whether
/// or not it triggered a replacement, so `should_replace` can enforce the
/// cooldown on the next tick.
pub fn record_drift_check(schedule: &mut TwapSchedule, now: Timestamp) {
    for order in &mut schedule.orders {
        order.last_drift_check_at = Some(now);
    }
}

/// Volatility fraction derived from recent BTC daily closes against the
/// current portfolio's asset, used to size a fresh schedule's slicing.
pub fn relative_atr_for(daily_closes: &[Krw]) -> Decimal {
    atr_relative(daily_closes)
}
