use async_trait::async_trait;
use chrono::{DateTime, Utc};

use kairos_core::{Asset, Krw};

use crate::error::HistoryError;

/// Returns BTC long-horizon closes for the classifier, and daily bars for
/// the scheduler's volatility signal. Implementations are expected to
/// cache the 200-week moving average keyed by `(asset, calendar_day)`.
#[async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    /// Time-ordered sequence of weekly closing prices, at least 200 points
    /// (~4 years), oldest first.
    async fn weekly_closes(&self, asset: Asset) -> Result<Vec<Krw>, HistoryError>;

    /// Time-ordered sequence of daily closing prices for the last `days`
    /// days, oldest first. Used for the ATR volatility signal.
    async fn daily_closes(&self, asset: Asset, days: u32) -> Result<Vec<Krw>, HistoryError>;

    /// Current price. On most adapters this mirrors
    /// `ExchangeAdapter::get_last_price`, kept distinct here so the
    /// provider can be swapped independently of the trading adapter
    /// (e.g. a USD-denominated upstream converted via a supplied rate).
    async fn current_price(&self, asset: Asset) -> Result<Krw, HistoryError>;

    /// 200-week moving average as of `now`. Requires at least 200 weekly
    /// closes; fewer than that is `HistoryError::Unavailable`, matching the
    /// same disposition `weekly_closes` returning a short series would
    /// produce. The default just averages `weekly_closes`'s last 200
    /// points uncached; adapters that hit a real upstream should override
    /// this to memoize per calendar day and fall back to a recent cached
    /// value on a transient fetch error.
    async fn ma_200w(&self, asset: Asset, _now: DateTime<Utc>) -> Result<Krw, HistoryError> {
        let closes = self.weekly_closes(asset).await?;
        if closes.len() < 200 {
            return Err(HistoryError::Unavailable);
        }
        let window = &closes[closes.len() - 200..];
        let sum: i64 = window.iter().map(|k| k.0).sum();
        Ok(Krw(sum / 200))
    }
}
