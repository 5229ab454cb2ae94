//! ExecutionCoordinator: the single `tick(now)` entry point that composes
//! classifier, planner, and scheduler against one exchange/store/history
//! backend.
//!
//! Grounded on `athena-runner::bootstrap`/`simulation`'s composition
//! pattern: an explicit construction graph held by one struct, no global
//! mutable state. Unlike the teacher's simulation loop (which spawns
//! long-running tasks bridging channels), this coordinator has exactly one
//! operational entry point invoked by an external scheduler (a cron, a
//! timer task in `kairos-app`) — there is no in-process event loop to own.

pub mod config;
pub mod error;
pub mod report;

use std::sync::Arc;

use rust_decimal::Decimal;

use kairos_core::{Asset, Krw, OrderOutcome, Portfolio, RebalanceAudit, Season, Timestamp, TwapSchedule};
use kairos_ports::{ExchangeAdapter, PriceHistoryProvider, Store};

use kairos_scheduler::{detect_drift, record_drift_check, relative_atr_for, should_replace, SchedulerConfig, TwapScheduler};

pub use config::CoordinatorConfig;
pub use error::CoordinatorError;
pub use report::{Observer, OrderProgress, ScheduleAction, SchedulerStatus, TickReport};

/// Build a priced `Portfolio` from the exchange's balances, valuing every
/// non-KRW holding at `get_last_price`. Rebuilt fresh on every tick, never
/// cached across ticks, per spec.md's "never cached" note on `Portfolio`.
async fn price_portfolio<E: ExchangeAdapter>(exchange: &E) -> Result<Portfolio, CoordinatorError> {
    use std::collections::BTreeMap;
    let balances = exchange.get_balances().await?;
    let mut holdings = BTreeMap::new();
    for (asset, amount) in balances {
        let value_krw = if asset == Asset::Krw {
            Krw(amount.try_into().unwrap_or(0))
        } else {
            let price = exchange.get_last_price(asset).await?;
            Krw((amount * Decimal::from(price.0)).round().try_into().unwrap_or(0))
        };
        holdings.insert(asset, kairos_core::Holding::new(amount, value_krw));
    }
    Ok(Portfolio::new(holdings))
}

/// Build the `RebalanceAudit` for a schedule that has just left `Active`,
/// whether by reaching a terminal status via `advance()` or by being
/// superseded via `replace()`.
fn audit_for(schedule: &TwapSchedule, final_portfolio: Portfolio, ended_at: Timestamp) -> RebalanceAudit {
    let outcomes = schedule
        .orders
        .iter()
        .map(|order| OrderOutcome {
            asset: order.asset,
            side: order.side,
            total_krw: order.total_krw,
            executed_krw: Krw(order.total_krw.0 - order.remaining_krw.0),
            status: order.status,
        })
        .collect();

    RebalanceAudit {
        schedule_id: schedule.schedule_id,
        started_at: schedule.created_at,
        ended_at,
        initial_portfolio: schedule.initial_portfolio.clone(),
        final_portfolio,
        outcomes,
    }
}

/// Composes C1 (`ExchangeAdapter`)/C2 (`PriceHistoryProvider`) with C3–C6
/// (classifier, resolver, planner, scheduler) behind one `tick()` call.
/// Generic over exchange, store, and history provider so the same
/// coordinator logic drives both `SimulatedExchange` in tests and
/// `CoinoneAdapter` in production.
pub struct ExecutionCoordinator<E, S, H> {
    exchange: Arc<E>,
    store: Arc<S>,
    history: Arc<H>,
    scheduler: TwapScheduler<E, S>,
    config: CoordinatorConfig,
    observers: Vec<Box<dyn Observer>>,
}

impl<E, S, H> ExecutionCoordinator<E, S, H>
where
    E: ExchangeAdapter,
    S: Store,
    H: PriceHistoryProvider,
{
    pub fn new(
        exchange: Arc<E>,
        store: Arc<S>,
        history: Arc<H>,
        scheduler_config: SchedulerConfig,
        config: CoordinatorConfig,
    ) -> Self {
        let scheduler = TwapScheduler::new(exchange.clone(), store.clone(), scheduler_config);
        Self {
            exchange,
            store,
            history,
            scheduler,
            config,
            observers: Vec::new(),
        }
    }

    /// Register an observer notified after every `tick()`. Zero are
    /// registered by default.
    pub fn register_observer(&mut self, observer: Box<dyn Observer>) {
        self.observers.push(observer);
    }

    /// Reconcile the persisted active schedule against the exchange's view
    /// of its open orders. Call once at process start, before the first
    /// `tick()`.
    pub async fn recover(&self, now: Timestamp) -> Result<(), CoordinatorError> {
        self.scheduler.recover(now).await?;
        Ok(())
    }

    fn notify(&self, report: &TickReport) {
        for observer in &self.observers {
            observer.observe(report);
        }
    }

    /// Season + target weights as of `now`, consulting the last persisted
    /// season for hysteresis. Returns whether the season changed versus
    /// that persisted record.
    async fn resolve_season(
        &self,
        now: Timestamp,
    ) -> Result<(Season, bool, Krw, Krw), CoordinatorError> {
        let current_price = self.history.current_price(Asset::Btc).await?;
        let ma_200w = self.history.ma_200w(Asset::Btc, now).await?;
        let last_record = self.store.latest_season_record().await?;
        let previous_season = last_record.as_ref().map(|r| r.season);

        let season = kairos_classifier::classify_season(
            current_price,
            ma_200w,
            previous_season,
            self.config.buffer_band,
        );
        let season_changed = previous_season.is_some_and(|p| p != season);

        if season_changed || last_record.is_none() {
            self.store
                .append_season_record(&kairos_core::SeasonRecord {
                    at: now,
                    season,
                    btc_price: current_price,
                    btc_ma_200w: ma_200w,
                })
                .await?;
        }

        Ok((season, season_changed, current_price, ma_200w))
    }

    async fn relative_atr(&self) -> Result<Decimal, CoordinatorError> {
        let daily = self.history.daily_closes(Asset::Btc, 15).await?;
        Ok(relative_atr_for(&daily))
    }

    /// The only operational entry point: observe market state, detect
    /// drift, and drive the scheduler through exactly one of start/advance/
    /// replace.
    pub async fn tick(&self, now: Timestamp) -> Result<TickReport, CoordinatorError> {
        let span = tracing::info_span!("tick", %now);
        let _guard = span.enter();

        let (season, season_changed, _price, _ma) = self.resolve_season(now).await?;
        let targets = kairos_classifier::resolve_targets(season, self.config.intra_crypto)?;
        let portfolio = price_portfolio(&*self.exchange).await?;

        let active = self.store.load_active_schedule().await?;

        let report = match active {
            Some(mut schedule) if schedule.status == kairos_core::ScheduleStatus::Active => {
                let mut reasons = detect_drift(
                    &schedule,
                    season,
                    &targets,
                    &portfolio,
                    now,
                    self.scheduler.config(),
                );
                if season_changed
                    && !reasons
                        .iter()
                        .any(|r| matches!(r, kairos_scheduler::DriftReason::SeasonChanged { .. }))
                {
                    reasons.push(kairos_scheduler::DriftReason::SeasonChanged {
                        from: schedule.season_at_creation,
                        to: season,
                    });
                }

                if should_replace(&schedule, &reasons, now, self.scheduler.config()) {
                    record_drift_check(&mut schedule, now);
                    let relative_atr = self.relative_atr().await?;
                    let plan = kairos_planner::plan_rebalance(&portfolio, &targets, self.config.min_notional);
                    let old_schedule_id = schedule.schedule_id;
                    let (cancelled, new_schedule) = self
                        .scheduler
                        .replace(schedule, &plan, season, targets, portfolio.clone(), relative_atr, now)
                        .await?;
                    let audit = audit_for(&cancelled, portfolio.clone(), now);
                    self.store.append_rebalance_audit(&audit).await?;
                    TickReport {
                        at: now,
                        season,
                        season_changed,
                        drift_reasons: reasons,
                        action: ScheduleAction::Replaced {
                            old_schedule_id,
                            new_schedule_id: new_schedule.schedule_id,
                        },
                        slice_outcomes: Vec::new(),
                    }
                } else {
                    record_drift_check(&mut schedule, now);
                    let schedule_id = schedule.schedule_id;
                    let outcomes = self.scheduler.advance(&mut schedule, now).await?;
                    self.store.save_schedule(&schedule).await?;
                    if schedule.status != kairos_core::ScheduleStatus::Active {
                        let audit = audit_for(&schedule, portfolio.clone(), now);
                        self.store.append_rebalance_audit(&audit).await?;
                    }
                    TickReport {
                        at: now,
                        season,
                        season_changed,
                        drift_reasons: reasons,
                        action: ScheduleAction::Advanced { schedule_id },
                        slice_outcomes: outcomes,
                    }
                }
            }
            _ => {
                let plan = kairos_planner::plan_rebalance(&portfolio, &targets, self.config.min_notional);
                if plan.is_empty() {
                    TickReport {
                        at: now,
                        season,
                        season_changed,
                        drift_reasons: Vec::new(),
                        action: ScheduleAction::Idle,
                        slice_outcomes: Vec::new(),
                    }
                } else {
                    let relative_atr = self.relative_atr().await?;
                    let schedule = self
                        .scheduler
                        .start(&plan, season, targets, portfolio.clone(), relative_atr, now)
                        .await?;
                    TickReport {
                        at: now,
                        season,
                        season_changed,
                        drift_reasons: Vec::new(),
                        action: ScheduleAction::Started {
                            schedule_id: schedule.schedule_id,
                        },
                        slice_outcomes: Vec::new(),
                    }
                }
            }
        };

        self.notify(&report);
        Ok(report)
    }

    /// Equivalent to a tick that forces planner invocation even if drift
    /// detection says otherwise: cancels any active schedule and starts a
    /// fresh one against current balances and targets.
    pub async fn force_rebalance(&self, now: Timestamp) -> Result<TickReport, CoordinatorError> {
        let (season, season_changed, _price, _ma) = self.resolve_season(now).await?;
        let targets = kairos_classifier::resolve_targets(season, self.config.intra_crypto)?;
        let portfolio = price_portfolio(&*self.exchange).await?;
        let plan = kairos_planner::plan_rebalance(&portfolio, &targets, self.config.min_notional);
        let relative_atr = self.relative_atr().await?;

        let active = self.store.load_active_schedule().await?;
        let report = match active {
            Some(schedule) if schedule.status == kairos_core::ScheduleStatus::Active => {
                let old_schedule_id = schedule.schedule_id;
                let (cancelled, new_schedule) = self
                    .scheduler
                    .replace(schedule, &plan, season, targets, portfolio.clone(), relative_atr, now)
                    .await?;
                let audit = audit_for(&cancelled, portfolio.clone(), now);
                self.store.append_rebalance_audit(&audit).await?;
                TickReport {
                    at: now,
                    season,
                    season_changed,
                    drift_reasons: Vec::new(),
                    action: ScheduleAction::Replaced {
                        old_schedule_id,
                        new_schedule_id: new_schedule.schedule_id,
                    },
                    slice_outcomes: Vec::new(),
                }
            }
            _ if !plan.is_empty() => {
                let schedule = self
                    .scheduler
                    .start(&plan, season, targets, portfolio.clone(), relative_atr, now)
                    .await?;
                TickReport {
                    at: now,
                    season,
                    season_changed,
                    drift_reasons: Vec::new(),
                    action: ScheduleAction::Started {
                        schedule_id: schedule.schedule_id,
                    },
                    slice_outcomes: Vec::new(),
                }
            }
            _ => TickReport {
                at: now,
                season,
                season_changed,
                drift_reasons: Vec::new(),
                action: ScheduleAction::Idle,
                slice_outcomes: Vec::new(),
            },
        };

        self.notify(&report);
        Ok(report)
    }

    /// Read-only snapshot of the active schedule, if any — does not call
    /// the exchange or write to the store. Crash recovery runs separately,
    /// once, via `recover()` at process start.
    pub async fn status(&self) -> Result<SchedulerStatus, CoordinatorError> {
        let Some(schedule) = self.store.load_active_schedule().await? else {
            return Ok(SchedulerStatus::empty());
        };

        let orders = schedule
            .orders
            .iter()
            .map(|order| OrderProgress {
                asset: order.asset,
                executed_slices: order.executed_slices,
                slice_count: order.slice_count,
                remaining_krw: order.remaining_krw,
                next_slice_due_at: order.next_slice_number().map(|n| {
                    order.start_at + order.slice_interval * (n as i32 - 1)
                }),
            })
            .collect();

        Ok(SchedulerStatus {
            schedule_id: Some(schedule.schedule_id),
            status: Some(schedule.status),
            season: Some(schedule.season_at_creation),
            orders,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use kairos_core::schedule::ExchangeOrderId;
    use kairos_core::{RebalanceAudit, Side};
    use kairos_ports::{
        ExchangeError, HistoryError, OrderState, OrderStatusReport, OrderType, PlacedOrder,
        StoreError,
    };
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn ts(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    struct FakeExchange {
        balances: BTreeMap<Asset, Decimal>,
        price: Krw,
        placed: Mutex<Vec<String>>,
    }

    impl FakeExchange {
        fn with_balances(balances: BTreeMap<Asset, Decimal>) -> Self {
            Self {
                balances,
                price: Krw(50_000_000),
                placed: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ExchangeAdapter for FakeExchange {
        async fn get_balances(&self) -> Result<BTreeMap<Asset, Decimal>, ExchangeError> {
            Ok(self.balances.clone())
        }

        async fn get_last_price(&self, _asset: Asset) -> Result<Krw, ExchangeError> {
            Ok(self.price)
        }

        async fn place_order(
            &self,
            client_order_id: &str,
            _asset: Asset,
            _side: Side,
            notional_krw: Krw,
            _order_type: OrderType,
            _price: Option<Krw>,
        ) -> Result<PlacedOrder, ExchangeError> {
            self.placed.lock().push(client_order_id.to_string());
            let _ = notional_krw;
            Ok(PlacedOrder {
                order_id: client_order_id.to_string(),
                state: OrderState::Filled,
            })
        }

        async fn cancel_order(&self, _order_id: &ExchangeOrderId) -> Result<(), ExchangeError> {
            Ok(())
        }

        async fn get_order_status(
            &self,
            _order_id: &ExchangeOrderId,
        ) -> Result<OrderStatusReport, ExchangeError> {
            Ok(OrderStatusReport {
                state: OrderState::Filled,
                filled_amount: Decimal::ZERO,
                average_price: None,
                filled_krw: Krw(0),
                fees_krw: Krw(0),
            })
        }
    }

    struct FakeHistory {
        weekly: Vec<Krw>,
        daily: Vec<Krw>,
        current: Krw,
    }

    impl FakeHistory {
        fn flat_at(price: Krw) -> Self {
            Self {
                weekly: vec![price; 200],
                daily: vec![price; 20],
                current: price,
            }
        }
    }

    #[async_trait]
    impl PriceHistoryProvider for FakeHistory {
        async fn weekly_closes(&self, _asset: Asset) -> Result<Vec<Krw>, HistoryError> {
            Ok(self.weekly.clone())
        }

        async fn daily_closes(&self, _asset: Asset, days: u32) -> Result<Vec<Krw>, HistoryError> {
            let start = self.daily.len().saturating_sub(days as usize);
            Ok(self.daily[start..].to_vec())
        }

        async fn current_price(&self, _asset: Asset) -> Result<Krw, HistoryError> {
            Ok(self.current)
        }
    }

    #[derive(Default)]
    struct FakeStore {
        active: Mutex<Option<kairos_core::TwapSchedule>>,
        seasons: Mutex<Vec<kairos_core::SeasonRecord>>,
    }

    #[async_trait]
    impl Store for FakeStore {
        async fn save_schedule(&self, schedule: &kairos_core::TwapSchedule) -> Result<(), StoreError> {
            *self.active.lock() = Some(schedule.clone());
            Ok(())
        }

        async fn load_active_schedule(&self) -> Result<Option<kairos_core::TwapSchedule>, StoreError> {
            Ok(self.active.lock().clone())
        }

        async fn append_season_record(&self, record: &kairos_core::SeasonRecord) -> Result<(), StoreError> {
            self.seasons.lock().push(record.clone());
            Ok(())
        }

        async fn latest_season_record(&self) -> Result<Option<kairos_core::SeasonRecord>, StoreError> {
            Ok(self.seasons.lock().last().cloned())
        }

        async fn append_rebalance_audit(&self, _audit: &RebalanceAudit) -> Result<(), StoreError> {
            Ok(())
        }

        async fn load_ma_cache(&self, _asset: Asset) -> Result<Option<(Krw, chrono::NaiveDate)>, StoreError> {
            Ok(None)
        }

        async fn store_ma_cache(
            &self,
            _asset: Asset,
            _value: Krw,
            _day: chrono::NaiveDate,
        ) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn portfolio_balances() -> BTreeMap<Asset, Decimal> {
        let mut m = BTreeMap::new();
        m.insert(Asset::Krw, dec!(3_000_000));
        m.insert(Asset::Btc, dec!(0.08));
        m.insert(Asset::Eth, dec!(1.2));
        m
    }

    fn coordinator(
        exchange: Arc<FakeExchange>,
        store: Arc<FakeStore>,
        history: Arc<FakeHistory>,
    ) -> ExecutionCoordinator<FakeExchange, FakeStore, FakeHistory> {
        ExecutionCoordinator::new(
            exchange,
            store,
            history,
            SchedulerConfig::default(),
            CoordinatorConfig::default(),
        )
    }

    #[tokio::test]
    async fn tick_starts_a_schedule_when_none_is_active() {
        let exchange = Arc::new(FakeExchange::with_balances(portfolio_balances()));
        let store = Arc::new(FakeStore::default());
        let history = Arc::new(FakeHistory::flat_at(Krw(50_000_000)));
        let coordinator = coordinator(exchange, store.clone(), history);

        let report = coordinator.tick(ts(0)).await.unwrap();
        assert!(matches!(report.action, ScheduleAction::Started { .. }));
        assert!(store.active.lock().is_some());
    }

    #[tokio::test]
    async fn tick_is_idle_when_portfolio_already_matches_targets() {
        // Neutral season (flat price history, no prior season record) puts
        // 50% KRW / 50% crypto split across the default intra-crypto
        // allocation; hold exactly that so the planner has nothing to do.
        let mut balances = BTreeMap::new();
        balances.insert(Asset::Krw, dec!(5_000_000));
        balances.insert(Asset::Btc, dec!(0.04)); // 0.04 * 50_000_000 = 2_000_000 (20%)
        balances.insert(Asset::Eth, dec!(0.03)); // 1_500_000 (15%)
        balances.insert(Asset::Xrp, dec!(0.015)); // 750_000 (7.5%)
        balances.insert(Asset::Sol, dec!(0.015)); // 750_000 (7.5%)
        let exchange = Arc::new(FakeExchange::with_balances(balances));
        let store = Arc::new(FakeStore::default());
        let history = Arc::new(FakeHistory::flat_at(Krw(50_000_000)));
        let coordinator = coordinator(exchange, store, history);

        let report = coordinator.tick(ts(0)).await.unwrap();
        assert_eq!(report.action, ScheduleAction::Idle);
    }

    #[tokio::test]
    async fn status_is_empty_with_no_active_schedule() {
        let exchange = Arc::new(FakeExchange::with_balances(portfolio_balances()));
        let store = Arc::new(FakeStore::default());
        let history = Arc::new(FakeHistory::flat_at(Krw(50_000_000)));
        let coordinator = coordinator(exchange, store, history);

        let status = coordinator.status().await.unwrap();
        assert!(status.schedule_id.is_none());
    }

    #[tokio::test]
    async fn force_rebalance_replaces_an_active_schedule() {
        let exchange = Arc::new(FakeExchange::with_balances(portfolio_balances()));
        let store = Arc::new(FakeStore::default());
        let history = Arc::new(FakeHistory::flat_at(Krw(50_000_000)));
        let coordinator = coordinator(exchange, store.clone(), history);

        let first = coordinator.tick(ts(0)).await.unwrap();
        let ScheduleAction::Started { schedule_id: first_id } = first.action else {
            panic!("expected first tick to start a schedule");
        };

        let second = coordinator.force_rebalance(ts(100)).await.unwrap();
        match second.action {
            ScheduleAction::Replaced { old_schedule_id, new_schedule_id } => {
                assert_eq!(old_schedule_id, first_id);
                assert_ne!(new_schedule_id, first_id);
            }
            other => panic!("expected a replacement, got {other:?}"),
        }
    }
}
