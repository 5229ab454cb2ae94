use async_trait::async_trait;
use chrono::NaiveDate;

use kairos_core::{Asset, Krw, RebalanceAudit, SeasonRecord, TwapSchedule};

use crate::error::StoreError;

/// Durable persistence for the active TWAP schedule, slice history, season
/// history, and rebalance audit.
///
/// `save_schedule` must be atomic: on return, a crash leaves either the
/// previous persisted state or the new one, never a partial write.
#[async_trait]
pub trait Store: Send + Sync {
    async fn save_schedule(&self, schedule: &TwapSchedule) -> Result<(), StoreError>;

    async fn load_active_schedule(&self) -> Result<Option<TwapSchedule>, StoreError>;

    async fn append_season_record(&self, record: &SeasonRecord) -> Result<(), StoreError>;

    async fn latest_season_record(&self) -> Result<Option<SeasonRecord>, StoreError>;

    async fn append_rebalance_audit(&self, audit: &RebalanceAudit) -> Result<(), StoreError>;

    async fn load_ma_cache(&self, asset: Asset) -> Result<Option<(Krw, NaiveDate)>, StoreError>;

    async fn store_ma_cache(
        &self,
        asset: Asset,
        value: Krw,
        day: NaiveDate,
    ) -> Result<(), StoreError>;
}
