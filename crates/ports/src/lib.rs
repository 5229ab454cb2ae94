//! Kairos Ports
//!
//! Port definitions (traits) for the Kairos rebalancing engine. These
//! define the boundaries between pure domain logic (`kairos-core`) and
//! infrastructure (`kairos-exchange`, `kairos-store`).

mod clock;
mod error;
mod exchange;
mod price_history;
mod store;

pub use clock::Clock;
pub use error::{ExchangeError, HistoryError, StoreError};
pub use exchange::{
    ExchangeAdapter, OrderState, OrderStatusReport, OrderType, PlacedOrder,
};
pub use price_history::PriceHistoryProvider;
pub use store::Store;
