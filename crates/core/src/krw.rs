use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// An integer amount of Korean won. KRW has no fractional subunit in this
/// system, so it is never represented as a `Decimal` — a newtype keeps it
/// from being accidentally summed with a crypto amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Krw(pub i64);

impl Krw {
    pub const ZERO: Krw = Krw(0);

    pub fn abs(self) -> Krw {
        Krw(self.0.abs())
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Krw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} KRW", self.0)
    }
}

impl Add for Krw {
    type Output = Krw;
    fn add(self, rhs: Krw) -> Krw {
        Krw(self.0 + rhs.0)
    }
}

impl Sub for Krw {
    type Output = Krw;
    fn sub(self, rhs: Krw) -> Krw {
        Krw(self.0 - rhs.0)
    }
}

impl Neg for Krw {
    type Output = Krw;
    fn neg(self) -> Krw {
        Krw(-self.0)
    }
}

impl AddAssign for Krw {
    fn add_assign(&mut self, rhs: Krw) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Krw {
    fn sub_assign(&mut self, rhs: Krw) {
        self.0 -= rhs.0;
    }
}

impl Sum for Krw {
    fn sum<I: Iterator<Item = Krw>>(iter: I) -> Krw {
        iter.fold(Krw::ZERO, Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic() {
        let a = Krw(1_000_000);
        let b = Krw(300_000);
        assert_eq!(a - b, Krw(700_000));
        assert_eq!((a - b).abs(), Krw(700_000));
        assert_eq!((b - a).abs(), Krw(700_000));
        assert_eq!(-a, Krw(-1_000_000));
    }

    #[test]
    fn sum_over_iterator() {
        let total: Krw = vec![Krw(100), Krw(200), Krw(300)].into_iter().sum();
        assert_eq!(total, Krw(600));
    }
}
