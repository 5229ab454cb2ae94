use serde::{Deserialize, Serialize};
use std::fmt;

/// A tradeable asset, plus the quote currency `Krw`.
///
/// Declaration order is the canonical serialization/iteration order used
/// throughout the engine (planner output ordering, weight-map iteration).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Asset {
    Btc,
    Eth,
    Xrp,
    Sol,
    Krw,
}

impl Asset {
    /// The four crypto assets the engine can hold a position in, in
    /// canonical order. Does not include `Krw`.
    pub const CRYPTO: [Asset; 4] = [Asset::Btc, Asset::Eth, Asset::Xrp, Asset::Sol];

    pub fn is_crypto(self) -> bool {
        !matches!(self, Asset::Krw)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Asset::Btc => "BTC",
            Asset::Eth => "ETH",
            Asset::Xrp => "XRP",
            Asset::Sol => "SOL",
            Asset::Krw => "KRW",
        };
        f.write_str(s)
    }
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Signed sign: `+1` for `Buy`, `-1` for `Sell`.
    pub fn sign(self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Buy => "Buy",
            Side::Sell => "Sell",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_ordering_matches_declaration() {
        let mut assets = vec![Asset::Sol, Asset::Krw, Asset::Btc, Asset::Xrp, Asset::Eth];
        assets.sort();
        assert_eq!(
            assets,
            vec![Asset::Btc, Asset::Eth, Asset::Xrp, Asset::Sol, Asset::Krw]
        );
    }

    #[test]
    fn krw_is_not_crypto() {
        assert!(!Asset::Krw.is_crypto());
        assert!(Asset::Btc.is_crypto());
    }

    #[test]
    fn side_opposite_round_trips() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite().opposite(), Side::Sell);
    }
}
