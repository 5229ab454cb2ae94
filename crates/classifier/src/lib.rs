//! Kairos Classifier
//!
//! Pure, deterministic mapping from BTC price history to a market season
//! (C3), and composition of season allocation with the fixed intra-crypto
//! allocation into a target weight map (C4). No I/O, no async.

mod resolver;
mod season_filter;

pub use resolver::resolve_targets;
pub use season_filter::{classify_season, DEFAULT_BUFFER_BAND};
