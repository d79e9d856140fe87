use crate::errors::{LedgerError, LedgerResult};
use rust_decimal::Decimal;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Fractional digits carried by every amount (currency minor units).
pub const MINOR_UNITS: u32 = 2;

/// Exact, non-negative currency amount with two fractional digits.
///
/// Values with more precision than [`MINOR_UNITS`] are rejected rather than
/// rounded, so every stored balance is exactly what the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(value: Decimal) -> LedgerResult<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(LedgerError::InvalidAmount(format!("{value} is negative")));
        }

        if value.normalize().scale() > MINOR_UNITS {
            return Err(LedgerError::InvalidAmount(format!(
                "{value} has more than {MINOR_UNITS} fractional digits"
            )));
        }

        let mut exact = value.abs();
        exact.rescale(MINOR_UNITS);
        Ok(Self(exact))
    }

    /// Amount for a movement: strictly greater than zero.
    pub fn positive(value: Decimal) -> LedgerResult<Self> {
        if value <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "{value} must be greater than zero"
            )));
        }
        Self::new(value)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, other: Money) -> LedgerResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| LedgerError::InvalidAmount(format!("{self} + {other} overflows")))
    }

    /// Fails with `NegativeResult` instead of going below zero.
    pub fn checked_sub(self, other: Money) -> LedgerResult<Money> {
        if other.0 > self.0 {
            return Err(LedgerError::NegativeResult);
        }
        Ok(Money(self.0 - other.0))
    }

    pub fn sum<I>(amounts: I) -> LedgerResult<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, amount| acc.checked_add(amount))
    }
}

impl TryFrom<Decimal> for Money {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Money::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl FromStr for Money {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim())
            .map_err(|_| LedgerError::InvalidAmount(format!("'{}' is not a number", s.trim())))?;
        Money::new(value)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

// Always a decimal string, e.g. "750.00".
impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(MoneyVisitor)
    }
}

struct MoneyVisitor;

impl<'de> Visitor<'de> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative decimal amount with at most two fractional digits")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Money, E> {
        Money::from_str(value).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Money, E> {
        Money::new(Decimal::from(value)).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Money, E> {
        Money::new(Decimal::from(value)).map_err(E::custom)
    }
}
