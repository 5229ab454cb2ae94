use thiserror::Error;

use kairos_core::error::DomainError;
use kairos_ports::{ExchangeError, HistoryError, StoreError};
use kairos_scheduler::SchedulerError;

/// Errors surfaced by `ExecutionCoordinator::tick`. Every variant is fatal
/// to the tick in progress; a `Transient` exchange condition never reaches
/// here, it is absorbed by the scheduler as a `SliceOutcome::Transient`.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}
