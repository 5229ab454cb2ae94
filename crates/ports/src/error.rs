use thiserror::Error;

/// Error taxonomy surfaced by `ExchangeAdapter`, per the spec's
/// disposition table: `Transient` is retried by the caller on the next
/// tick, `Fatal` propagates as a hard stop, the rest drive specific
/// `TwapOrder` state transitions.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExchangeError {
    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),

    #[error("notional above exchange maximum: {0}")]
    NotionalAboveMax(String),

    #[error("notional below exchange minimum: {0}")]
    NotionalBelowMin(String),

    #[error("price unavailable for this asset")]
    PriceUnavailable,

    #[error("transient exchange error: {0}")]
    Transient(String),

    #[error("fatal exchange error: {0}")]
    Fatal(String),
}

impl ExchangeError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExchangeError::Transient(_))
    }
}

/// Errors from `PriceHistoryProvider`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HistoryError {
    #[error("price history unavailable")]
    Unavailable,
}

/// Errors from `Store`. A `StoreError` is always treated as fatal by the
/// coordinator — durable progress cannot be guaranteed without it.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("store write failed: {0}")]
    Write(String),

    #[error("store read failed: {0}")]
    Read(String),

    #[error("store migration failed: {0}")]
    Migration(String),
}
