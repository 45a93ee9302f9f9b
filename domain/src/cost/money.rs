//! Exact USD amounts.
//!
//! [`Cost`] stores integer micro-dollars so that real-time budget checks and
//! retrospective reports add up identically. Decimal USD only appears at the
//! serde boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const MICROS_PER_USD: f64 = 1_000_000.0;

/// Raised when a decimal USD amount cannot be represented (NaN or infinite).
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("cost must be a finite USD amount, got {0}")]
pub struct InvalidCost(pub f64);

/// A USD amount in micro-dollars.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "f64", try_from = "f64")]
pub struct Cost(i64);

impl Cost {
    pub const ZERO: Cost = Cost(0);

    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Convert a decimal USD amount, rounding to the nearest micro-dollar.
    pub fn try_from_usd(usd: f64) -> Result<Self, InvalidCost> {
        if !usd.is_finite() {
            return Err(InvalidCost(usd));
        }
        Ok(Self((usd * MICROS_PER_USD).round() as i64))
    }

    pub const fn micros(self) -> i64 {
        self.0
    }

    pub fn as_usd(self) -> f64 {
        self.0 as f64 / MICROS_PER_USD
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn saturating_add(self, other: Cost) -> Cost {
        Cost(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Cost) -> Cost {
        Cost(self.0.saturating_sub(other.0))
    }
}

impl std::ops::Add for Cost {
    type Output = Cost;

    fn add(self, rhs: Cost) -> Cost {
        self.saturating_add(rhs)
    }
}

impl std::ops::AddAssign for Cost {
    fn add_assign(&mut self, rhs: Cost) {
        *self = self.saturating_add(rhs);
    }
}

impl std::iter::Sum for Cost {
    fn sum<I: Iterator<Item = Cost>>(iter: I) -> Cost {
        iter.fold(Cost::ZERO, |acc, c| acc + c)
    }
}

impl From<Cost> for f64 {
    fn from(cost: Cost) -> f64 {
        cost.as_usd()
    }
}

impl TryFrom<f64> for Cost {
    type Error = InvalidCost;

    fn try_from(usd: f64) -> Result<Self, Self::Error> {
        Cost::try_from_usd(usd)
    }
}

impl std::fmt::Display for Cost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${:.4}", self.as_usd())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(v: f64) -> Cost {
        Cost::try_from_usd(v).unwrap()
    }

    #[test]
    fn test_decimal_sums_are_exact() {
        // 0.1 + 0.2 != 0.3 in f64, but it must be exact for budgets.
        assert_eq!(usd(0.1) + usd(0.2), usd(0.3));
        assert_eq!(usd(0.2) + usd(0.2) + usd(0.2), usd(0.6));
    }

    #[test]
    fn test_rejects_non_finite() {
        assert!(Cost::try_from_usd(f64::NAN).is_err());
        assert!(Cost::try_from_usd(f64::INFINITY).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(usd(0.04).to_string(), "$0.0400");
        assert_eq!(Cost::ZERO.to_string(), "$0.0000");
    }

    #[test]
    fn test_serde_as_usd() {
        let json = serde_json::to_string(&usd(0.25)).unwrap();
        assert_eq!(json, "0.25");
        let back: Cost = serde_json::from_str("0.5").unwrap();
        assert_eq!(back, usd(0.5));
    }

    #[test]
    fn test_sum_and_sub() {
        let total: Cost = [usd(0.01), usd(0.02), usd(0.03)].into_iter().sum();
        assert_eq!(total, usd(0.06));
        assert_eq!(total.saturating_sub(usd(0.06)), Cost::ZERO);
        assert!(usd(-0.1).is_negative());
    }
}
