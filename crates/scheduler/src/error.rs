use thiserror::Error;

use kairos_ports::StoreError;

/// Errors that halt the coordinator and require operator action, per the
/// spec's error-disposition table: `Fatal` exchange errors and any store
/// write failure both propagate as `SchedulerFatal`.
#[derive(Debug, Error, Clone)]
pub enum SchedulerError {
    #[error("fatal exchange error: {0}")]
    Fatal(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
