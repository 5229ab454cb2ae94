use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use thiserror::Error;
use uuid::Uuid;

use kairos_core::{
    Asset, Krw, Portfolio, RebalanceAudit, ScheduleStatus, Season, SeasonRecord, Side,
    TargetWeights, TwapOrder, TwapOrderStatus, TwapSchedule,
};
use kairos_ports::{Store, StoreError};

use crate::codec;

/// Error parsing a value read back out of a TEXT column into a domain enum.
/// Indicates on-disk corruption or a schema/code version mismatch, never a
/// transient condition.
#[derive(Debug, Error)]
#[error("decode error: {0}")]
pub struct DecodeError(pub String);

impl From<DecodeError> for StoreError {
    fn from(e: DecodeError) -> Self {
        StoreError::Read(e.0)
    }
}

fn to_rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, DecodeError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DecodeError(format!("bad timestamp {s}: {e}")))
}

/// SQLite-backed `Store`, grounded on the settings-table persistence pattern
/// in the trade-executor example: plain `sqlx::query(...).bind(...)` against
/// a `SqlitePool`, no compile-time query checking.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connects to `database_url` (e.g. `sqlite://kairos.db` or
    /// `sqlite::memory:`), creating the database file if missing, and runs
    /// pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = sqlx::sqlite::SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StoreError::Migration(e.to_string()))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        tracing::info!(database_url, "store migrations applied");
        Ok(Self { pool })
    }

    async fn load_orders(&self, schedule_id: Uuid) -> Result<Vec<TwapOrder>, StoreError> {
        let rows = sqlx::query(
            "SELECT asset, side, total_krw, slice_count, slice_notional_krw, executed_slices, \
             remaining_krw, slice_interval_s, start_at, last_execution_at, last_drift_check_at, status \
             FROM twap_orders WHERE schedule_id = ?1 ORDER BY order_index",
        )
        .bind(schedule_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Read(e.to_string()))?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let asset = codec::asset_from_str(row.try_get::<String, _>("asset").unwrap().as_str())?;
            let side = codec::side_from_str(row.try_get::<String, _>("side").unwrap().as_str())?;
            let slice_interval =
                chrono::Duration::seconds(row.try_get::<i64, _>("slice_interval_s").unwrap());
            let start_at = parse_ts(&row.try_get::<String, _>("start_at").unwrap())?;
            let last_execution_at = row
                .try_get::<Option<String>, _>("last_execution_at")
                .unwrap()
                .map(|s| parse_ts(&s))
                .transpose()?;
            let last_drift_check_at = row
                .try_get::<Option<String>, _>("last_drift_check_at")
                .unwrap()
                .map(|s| parse_ts(&s))
                .transpose()?;
            let status =
                codec::order_status_from_str(row.try_get::<String, _>("status").unwrap().as_str())?;

            let exchange_rows = sqlx::query(
                "SELECT order_id FROM twap_exchange_orders \
                 WHERE schedule_id = ?1 AND asset = ?2 ORDER BY placed_at",
            )
            .bind(schedule_id.to_string())
            .bind(codec::asset_to_str(asset))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Read(e.to_string()))?;
            let exchange_order_ids = exchange_rows
                .iter()
                .map(|r| r.try_get::<String, _>("order_id").unwrap())
                .collect();

            orders.push(TwapOrder {
                asset,
                side,
                total_krw: Krw(row.try_get::<i64, _>("total_krw").unwrap()),
                slice_count: row.try_get::<i64, _>("slice_count").unwrap() as u32,
                slice_notional_krw: Krw(row.try_get::<i64, _>("slice_notional_krw").unwrap()),
                slice_interval,
                start_at,
                executed_slices: row.try_get::<i64, _>("executed_slices").unwrap() as u32,
                remaining_krw: Krw(row.try_get::<i64, _>("remaining_krw").unwrap()),
                last_execution_at,
                last_drift_check_at,
                status,
                exchange_order_ids,
            });
        }
        Ok(orders)
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn save_schedule(&self, schedule: &TwapSchedule) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;

        let schedule_id = schedule.schedule_id.to_string();
        let target_weights_json = serde_json::to_string(&schedule.target_weights)
            .map_err(|e| StoreError::Write(e.to_string()))?;
        let initial_portfolio_json = serde_json::to_string(&schedule.initial_portfolio)
            .map_err(|e| StoreError::Write(e.to_string()))?;
        let slicing_params_json = serde_json::to_string(
            &schedule
                .orders
                .iter()
                .map(|o| (codec::asset_to_str(o.asset), o.slice_count, o.slice_notional_krw.0))
                .collect::<Vec<_>>(),
        )
        .map_err(|e| StoreError::Write(e.to_string()))?;

        sqlx::query(
            "INSERT INTO twap_schedules (schedule_id, created_at, status, season, target_weights, \
             initial_portfolio, slicing_params) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(schedule_id) DO UPDATE SET \
                status = excluded.status, season = excluded.season, \
                target_weights = excluded.target_weights, slicing_params = excluded.slicing_params",
        )
        .bind(&schedule_id)
        .bind(to_rfc3339(schedule.created_at))
        .bind(codec::schedule_status_to_str(schedule.status))
        .bind(codec::season_to_str(schedule.season_at_creation))
        .bind(&target_weights_json)
        .bind(&initial_portfolio_json)
        .bind(&slicing_params_json)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Write(e.to_string()))?;

        for (order_index, order) in schedule.orders.iter().enumerate() {
            sqlx::query(
                "INSERT INTO twap_orders (schedule_id, asset, order_index, side, total_krw, slice_count, \
                 slice_notional_krw, executed_slices, remaining_krw, slice_interval_s, start_at, \
                 last_execution_at, last_drift_check_at, status) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14) \
                 ON CONFLICT(schedule_id, asset) DO UPDATE SET \
                    order_index = excluded.order_index, \
                    executed_slices = excluded.executed_slices, remaining_krw = excluded.remaining_krw, \
                    last_execution_at = excluded.last_execution_at, \
                    last_drift_check_at = excluded.last_drift_check_at, status = excluded.status",
            )
            .bind(&schedule_id)
            .bind(codec::asset_to_str(order.asset))
            .bind(order_index as i64)
            .bind(codec::side_to_str(order.side))
            .bind(order.total_krw.0)
            .bind(order.slice_count as i64)
            .bind(order.slice_notional_krw.0)
            .bind(order.executed_slices as i64)
            .bind(order.remaining_krw.0)
            .bind(order.slice_interval.num_seconds())
            .bind(to_rfc3339(order.start_at))
            .bind(order.last_execution_at.map(to_rfc3339))
            .bind(order.last_drift_check_at.map(to_rfc3339))
            .bind(codec::order_status_to_str(order.status))
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;

            for (slice_index, order_id) in order.exchange_order_ids.iter().enumerate() {
                let filled_krw = order.notional_for_slice(slice_index as u32 + 1);
                sqlx::query(
                    "INSERT INTO twap_exchange_orders (schedule_id, asset, order_id, placed_at, filled_krw, status) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                     ON CONFLICT(schedule_id, asset, order_id) DO NOTHING",
                )
                .bind(&schedule_id)
                .bind(codec::asset_to_str(order.asset))
                .bind(order_id)
                .bind(to_rfc3339(order.last_execution_at.unwrap_or(order.start_at)))
                .bind(filled_krw.0)
                .bind("Filled")
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Write(e.to_string()))?;
            }
        }

        tx.commit().await.map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }

    async fn load_active_schedule(&self) -> Result<Option<TwapSchedule>, StoreError> {
        let row = sqlx::query(
            "SELECT schedule_id, created_at, status, season, target_weights, initial_portfolio \
             FROM twap_schedules WHERE status = 'Active' ORDER BY created_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Read(e.to_string()))?;

        let Some(row) = row else { return Ok(None) };

        let schedule_id = Uuid::parse_str(&row.try_get::<String, _>("schedule_id").unwrap())
            .map_err(|e| StoreError::Read(e.to_string()))?;
        let created_at = parse_ts(&row.try_get::<String, _>("created_at").unwrap())?;
        let status =
            codec::schedule_status_from_str(row.try_get::<String, _>("status").unwrap().as_str())?;
        let season_at_creation =
            codec::season_from_str(row.try_get::<String, _>("season").unwrap().as_str())?;
        let target_weights: TargetWeights =
            serde_json::from_str(&row.try_get::<String, _>("target_weights").unwrap())
                .map_err(|e| StoreError::Read(e.to_string()))?;
        let initial_portfolio: Portfolio =
            serde_json::from_str(&row.try_get::<String, _>("initial_portfolio").unwrap())
                .map_err(|e| StoreError::Read(e.to_string()))?;

        let orders = self.load_orders(schedule_id).await?;

        Ok(Some(TwapSchedule {
            schedule_id,
            created_at,
            season_at_creation,
            target_weights,
            initial_portfolio,
            orders,
            status,
        }))
    }

    async fn append_season_record(&self, record: &SeasonRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO season_history (at, season, btc_price, btc_ma_200w) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(to_rfc3339(record.at))
        .bind(codec::season_to_str(record.season))
        .bind(record.btc_price.0)
        .bind(record.btc_ma_200w.0)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }

    async fn latest_season_record(&self) -> Result<Option<SeasonRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT at, season, btc_price, btc_ma_200w FROM season_history ORDER BY at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Read(e.to_string()))?;

        let Some(row) = row else { return Ok(None) };
        Ok(Some(SeasonRecord {
            at: parse_ts(&row.try_get::<String, _>("at").unwrap())?,
            season: codec::season_from_str(row.try_get::<String, _>("season").unwrap().as_str())?,
            btc_price: Krw(row.try_get::<i64, _>("btc_price").unwrap()),
            btc_ma_200w: Krw(row.try_get::<i64, _>("btc_ma_200w").unwrap()),
        }))
    }

    async fn append_rebalance_audit(&self, audit: &RebalanceAudit) -> Result<(), StoreError> {
        let initial_json = serde_json::to_string(&audit.initial_portfolio)
            .map_err(|e| StoreError::Write(e.to_string()))?;
        let final_json = serde_json::to_string(&audit.final_portfolio)
            .map_err(|e| StoreError::Write(e.to_string()))?;
        let summary_json =
            serde_json::to_string(&audit.outcomes).map_err(|e| StoreError::Write(e.to_string()))?;

        sqlx::query(
            "INSERT INTO rebalance_audits (schedule_id, started_at, ended_at, initial_portfolio, final_portfolio, summary) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(audit.schedule_id.to_string())
        .bind(to_rfc3339(audit.started_at))
        .bind(to_rfc3339(audit.ended_at))
        .bind(initial_json)
        .bind(final_json)
        .bind(summary_json)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }

    async fn load_ma_cache(&self, asset: Asset) -> Result<Option<(Krw, NaiveDate)>, StoreError> {
        let row = sqlx::query("SELECT value_krw, calendar_day FROM ma_cache WHERE asset = ?1")
            .bind(codec::asset_to_str(asset))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Read(e.to_string()))?;

        let Some(row) = row else { return Ok(None) };
        let day = NaiveDate::parse_from_str(&row.try_get::<String, _>("calendar_day").unwrap(), "%Y-%m-%d")
            .map_err(|e| StoreError::Read(e.to_string()))?;
        Ok(Some((Krw(row.try_get::<i64, _>("value_krw").unwrap()), day)))
    }

    async fn store_ma_cache(
        &self,
        asset: Asset,
        value: Krw,
        day: NaiveDate,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO ma_cache (asset, value_krw, calendar_day) VALUES (?1, ?2, ?3) \
             ON CONFLICT(asset) DO UPDATE SET value_krw = excluded.value_krw, calendar_day = excluded.calendar_day",
        )
        .bind(codec::asset_to_str(asset))
        .bind(value.0)
        .bind(day.format("%Y-%m-%d").to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use kairos_core::portfolio::{Holding, Portfolio};
    use kairos_core::{OrderOutcome, Side};
    use std::collections::BTreeMap;

    fn ts(h: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + h * 3600, 0).unwrap()
    }

    fn weights() -> TargetWeights {
        let mut m = BTreeMap::new();
        m.insert(Asset::Btc, rust_decimal::Decimal::ONE);
        TargetWeights::new(m).unwrap()
    }

    async fn memory_store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn schedule_round_trips_through_save_and_load() {
        let store = memory_store().await;
        let order = TwapOrder::new(
            Asset::Btc,
            Side::Sell,
            Krw(900_000),
            3,
            chrono::Duration::minutes(30),
            ts(0),
        );
        let schedule = TwapSchedule::new(ts(0), Season::RiskOn, weights(), Portfolio::new(BTreeMap::new()), vec![order]);

        store.save_schedule(&schedule).await.unwrap();
        let loaded = store.load_active_schedule().await.unwrap().unwrap();

        assert_eq!(loaded.schedule_id, schedule.schedule_id);
        assert_eq!(loaded.orders.len(), 1);
        assert_eq!(loaded.orders[0].total_krw, Krw(900_000));
        assert_eq!(loaded.orders[0].slice_count, 3);
    }

    #[tokio::test]
    async fn completed_schedule_is_not_returned_as_active() {
        let store = memory_store().await;
        let order = TwapOrder::new(
            Asset::Btc,
            Side::Sell,
            Krw(300_000),
            1,
            chrono::Duration::minutes(30),
            ts(0),
        );
        let mut schedule = TwapSchedule::new(ts(0), Season::RiskOn, weights(), Portfolio::new(BTreeMap::new()), vec![order]);
        schedule.mark_cancelled();

        store.save_schedule(&schedule).await.unwrap();
        assert!(store.load_active_schedule().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_schedule_is_idempotent_on_retry() {
        let store = memory_store().await;
        let mut order = TwapOrder::new(
            Asset::Btc,
            Side::Sell,
            Krw(900_000),
            3,
            chrono::Duration::minutes(30),
            ts(0),
        );
        order.record_execution("ex-1".into(), Krw(300_000), ts(0));
        let schedule = TwapSchedule::new(ts(0), Season::RiskOn, weights(), Portfolio::new(BTreeMap::new()), vec![order]);

        store.save_schedule(&schedule).await.unwrap();
        store.save_schedule(&schedule).await.unwrap();

        let loaded = store.load_active_schedule().await.unwrap().unwrap();
        assert_eq!(loaded.orders[0].exchange_order_ids.len(), 1);
    }

    #[tokio::test]
    async fn reload_preserves_the_sells_first_then_buys_order() {
        let store = memory_store().await;
        let sell = TwapOrder::new(Asset::Btc, Side::Sell, Krw(300_000), 1, chrono::Duration::minutes(30), ts(0));
        let buy_eth = TwapOrder::new(Asset::Eth, Side::Buy, Krw(300_000), 1, chrono::Duration::minutes(30), ts(0));
        let buy_btc = TwapOrder::new(Asset::Btc, Side::Buy, Krw(300_000), 1, chrono::Duration::minutes(30), ts(0));
        let ordered = vec![sell, buy_eth, buy_btc];
        let expected: Vec<_> = ordered.iter().map(|o| (o.asset, o.side)).collect();
        let schedule = TwapSchedule::new(ts(0), Season::RiskOn, weights(), Portfolio::new(BTreeMap::new()), ordered);

        store.save_schedule(&schedule).await.unwrap();
        let loaded = store.load_active_schedule().await.unwrap().unwrap();

        let actual: Vec<_> = loaded.orders.iter().map(|o| (o.asset, o.side)).collect();
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn exchange_order_filled_krw_reflects_the_remainder_absorbing_last_slice() {
        let store = memory_store().await;
        let mut order = TwapOrder::new(
            Asset::Btc,
            Side::Sell,
            Krw(1_000_000),
            3,
            chrono::Duration::minutes(30),
            ts(0),
        );
        order.record_execution("ex-1".into(), order.notional_for_slice(1), ts(0));
        order.record_execution("ex-2".into(), order.notional_for_slice(2), ts(1));
        order.record_execution("ex-3".into(), order.notional_for_slice(3), ts(2));
        let schedule = TwapSchedule::new(ts(0), Season::RiskOn, weights(), Portfolio::new(BTreeMap::new()), vec![order]);

        store.save_schedule(&schedule).await.unwrap();

        let rows = sqlx::query(
            "SELECT order_id, filled_krw FROM twap_exchange_orders \
             WHERE schedule_id = ?1 ORDER BY order_id",
        )
        .bind(schedule.schedule_id.to_string())
        .fetch_all(&store.pool)
        .await
        .unwrap();

        let filled: Vec<i64> = rows.iter().map(|r| r.try_get::<i64, _>("filled_krw").unwrap()).collect();
        assert_eq!(filled, vec![333_333, 333_333, 333_334]);
    }

    #[tokio::test]
    async fn season_history_returns_the_latest_record() {
        let store = memory_store().await;
        store
            .append_season_record(&SeasonRecord {
                at: ts(0),
                season: Season::Neutral,
                btc_price: Krw(50_000_000),
                btc_ma_200w: Krw(48_000_000),
            })
            .await
            .unwrap();
        store
            .append_season_record(&SeasonRecord {
                at: ts(1),
                season: Season::RiskOn,
                btc_price: Krw(53_000_000),
                btc_ma_200w: Krw(48_000_000),
            })
            .await
            .unwrap();

        let latest = store.latest_season_record().await.unwrap().unwrap();
        assert_eq!(latest.season, Season::RiskOn);
    }

    #[tokio::test]
    async fn ma_cache_round_trips() {
        let store = memory_store().await;
        let day = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        store.store_ma_cache(Asset::Btc, Krw(48_000_000), day).await.unwrap();

        let (value, loaded_day) = store.load_ma_cache(Asset::Btc).await.unwrap().unwrap();
        assert_eq!(value, Krw(48_000_000));
        assert_eq!(loaded_day, day);
    }

    #[tokio::test]
    async fn rebalance_audit_write_succeeds() {
        let store = memory_store().await;
        let portfolio = Portfolio::new(BTreeMap::from([(
            Asset::Krw,
            Holding::krw(Krw(10_000_000)),
        )]));
        let audit = RebalanceAudit {
            schedule_id: Uuid::new_v4(),
            started_at: ts(0),
            ended_at: ts(1),
            initial_portfolio: portfolio.clone(),
            final_portfolio: portfolio,
            outcomes: vec![OrderOutcome {
                asset: Asset::Btc,
                side: Side::Sell,
                total_krw: Krw(300_000),
                executed_krw: Krw(300_000),
                status: TwapOrderStatus::Completed,
            }],
        };
        store.append_rebalance_audit(&audit).await.unwrap();
    }
}
