//! Kairos Exchange
//!
//! Concrete `ExchangeAdapter` and `PriceHistoryProvider` implementations
//! (C1/C2). Nothing in this crate is consulted for *decisions* — it only
//! speaks to the outside world and reports what it sees.

pub mod coinone;
pub mod limits;
pub mod simulated;

pub use coinone::CoinoneAdapter;
pub use limits::AdapterLimits;
pub use simulated::SimulatedExchange;
