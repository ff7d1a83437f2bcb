use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Mul;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("Empty amount")]
    Empty,
    #[error("Invalid amount: {0}")]
    Invalid(String),
    #[error("Non-finite amount")]
    NonFinite,
}

/// How a textual amount spells its separators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberFormat {
    pub thousands_separator: Option<char>,
    pub decimal_separator: char,
}

impl NumberFormat {
    /// `1234.56`, no grouping.
    pub const PLAIN: NumberFormat = NumberFormat {
        thousands_separator: None,
        decimal_separator: '.',
    };

    /// `1.234,56`, as found in Italian exports.
    pub const ITALIAN: NumberFormat = NumberFormat {
        thousands_separator: Some('.'),
        decimal_separator: ',',
    };
}

impl Default for NumberFormat {
    fn default() -> Self {
        NumberFormat::PLAIN
    }
}

/// A signed monetary value. Keeps the precision it was created with until it is
/// explicitly rounded to cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    pub fn new(value: Decimal) -> Self {
        Money(value)
    }

    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::new(cents, 2))
    }

    pub fn from_f64(value: f64) -> Result<Self, MoneyError> {
        if !value.is_finite() {
            return Err(MoneyError::NonFinite);
        }
        Decimal::from_f64(value)
            .map(Money)
            .ok_or_else(|| MoneyError::Invalid(value.to_string()))
    }

    /// Parses a textual amount: grouping separators are stripped first, then the
    /// decimal separator is rewritten to `.`.
    pub fn parse(s: &str, format: &NumberFormat) -> Result<Self, MoneyError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(MoneyError::Empty);
        }
        let mut cleaned: String = s
            .chars()
            .filter(|c| Some(*c) != format.thousands_separator && !c.is_whitespace())
            .collect();
        if format.decimal_separator != '.' {
            cleaned = cleaned.replace(format.decimal_separator, ".");
        }
        Decimal::from_str(&cleaned)
            .map(Money)
            .map_err(|_| MoneyError::Invalid(s.to_string()))
    }

    pub fn value(self) -> Decimal {
        self.0
    }

    /// Rounds half to even, two fraction digits.
    pub fn round_cents(self) -> Self {
        Money(
            self.0
                .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven),
        )
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut value = self.0;
        if value.scale() < 2 {
            value.rescale(2);
        }
        write!(f, "{value}")
    }
}

impl Mul<Decimal> for Money {
    type Output = Self;
    fn mul(self, rate: Decimal) -> Self {
        Money(self.0 * rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    // ── parse ─────────────────────────────────────────────────────────────────

    #[test]
    fn parse_italian_grouped() {
        let m = Money::parse("1.234,56", &NumberFormat::ITALIAN).unwrap();
        assert_eq!(m.value(), dec("1234.56"));
    }

    #[test]
    fn parse_italian_negative() {
        let m = Money::parse("-50,00", &NumberFormat::ITALIAN).unwrap();
        assert_eq!(m.value(), dec("-50"));
    }

    #[test]
    fn parse_italian_multiple_groups() {
        let m = Money::parse("1.000.000,5", &NumberFormat::ITALIAN).unwrap();
        assert_eq!(m.value(), dec("1000000.5"));
    }

    #[test]
    fn parse_plain() {
        let m = Money::parse(" 99.99 ", &NumberFormat::PLAIN).unwrap();
        assert_eq!(m.value(), dec("99.99"));
    }

    #[test]
    fn parse_keeps_source_precision() {
        let m = Money::parse("0,125", &NumberFormat::ITALIAN).unwrap();
        assert_eq!(m.value().scale(), 3);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(
            Money::parse("", &NumberFormat::ITALIAN),
            Err(MoneyError::Empty)
        );
        assert!(matches!(
            Money::parse("n/a", &NumberFormat::ITALIAN),
            Err(MoneyError::Invalid(_))
        ));
    }

    // ── conversion helpers ────────────────────────────────────────────────────

    #[test]
    fn from_f64_rejects_nan() {
        assert_eq!(Money::from_f64(f64::NAN), Err(MoneyError::NonFinite));
        assert_eq!(Money::from_f64(-100.0).unwrap().value(), dec("-100"));
    }

    #[test]
    fn round_cents_is_half_even() {
        assert_eq!(Money::new(dec("2.345")).round_cents().value(), dec("2.34"));
        assert_eq!(Money::new(dec("2.355")).round_cents().value(), dec("2.36"));
    }

    #[test]
    fn multiply_by_rate() {
        let m = Money::from_cents(-10000) * dec("0.90");
        assert_eq!(m.round_cents().value(), dec("-90"));
    }

    #[test]
    fn display_pads_to_two_digits() {
        assert_eq!(Money::new(dec("50")).to_string(), "50.00");
        assert_eq!(Money::new(dec("-90.5")).to_string(), "-90.50");
        assert_eq!(Money::new(dec("0.125")).to_string(), "0.125");
    }
}
