//! Lossless monetary type backed by rust_decimal.
//!
//! All revenue, cost, profit, and commission math goes through this wrapper
//! so SQLite never does floating-point arithmetic on money.

use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Monetary amount with lossless decimal arithmetic.
///
/// Serializes to a JSON number by default; persisted as canonical TEXT.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Money(#[serde(with = "rust_decimal::serde::float")] RustDecimal);

impl Money {
    pub fn new(value: RustDecimal) -> Self {
        Money(value)
    }

    /// Parse from a canonical decimal string.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn parse(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Money)
    }

    /// Canonical string form: no exponent notation, no trailing zeros.
    pub fn to_canonical_string(&self) -> String {
        format!("{}", self.0.normalize())
    }

    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    pub fn zero() -> Self {
        Money(RustDecimal::ZERO)
    }

    pub fn hundred() -> Self {
        Money(RustDecimal::ONE_HUNDRED)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    pub fn abs(&self) -> Self {
        Money(self.0.abs())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Money(RustDecimal::from(value))
    }
}

impl From<RustDecimal> for Money {
    fn from(value: RustDecimal) -> Self {
        Money(value)
    }
}

impl From<Money> for RustDecimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl std::ops::Mul for Money {
    type Output = Money;

    fn mul(self, rhs: Money) -> Money {
        Money(self.0 * rhs.0)
    }
}

impl std::ops::Div for Money {
    type Output = Money;

    fn div(self, rhs: Money) -> Money {
        Money(self.0 / rhs.0)
    }
}

impl std::ops::Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        for s in ["123.45", "0.01", "1000000", "-45.9", "0"] {
            let money = Money::parse(s).expect("parse failed");
            let reparsed = Money::parse(&money.to_canonical_string()).expect("reparse failed");
            assert_eq!(money, reparsed, "roundtrip failed for {}", s);
        }
    }

    #[test]
    fn test_canonical_string_drops_trailing_zeros() {
        let money = Money::parse("90.00").unwrap();
        assert_eq!(money.to_canonical_string(), "90");
    }

    #[test]
    fn test_arithmetic() {
        let revenue = Money::parse("100").unwrap();
        let cost = Money::parse("10").unwrap();
        let profit = revenue - cost;
        assert_eq!(profit.to_canonical_string(), "90");

        let pct = Money::parse("10").unwrap();
        let commission = profit * (pct / Money::hundred());
        assert_eq!(commission.to_canonical_string(), "9");
    }

    #[test]
    fn test_negative_profit_not_clamped() {
        let profit = Money::parse("5").unwrap() - Money::parse("12").unwrap();
        assert!(profit.is_negative());
        assert_eq!(profit.to_canonical_string(), "-7");
    }

    #[test]
    fn test_json_serializes_as_number() {
        let money = Money::parse("12.5").unwrap();
        let json = serde_json::to_value(money).unwrap();
        assert!(json.is_number());
    }

    #[test]
    fn test_sign_predicates() {
        assert!(Money::parse("1").unwrap().is_positive());
        assert!(Money::parse("-1").unwrap().is_negative());
        assert!(Money::zero().is_zero());
        assert!(!Money::zero().is_positive());
    }
}
