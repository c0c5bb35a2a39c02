//! Decimal money amounts and currency codes.
//!
//! Amounts are stored in the database as `NUMERIC(12, 2)` and never touch
//! floating point. Conversion to minor units (paise, cents) happens only at the
//! payment-gateway boundary.

use core::fmt;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Money`] value.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// Amount was below zero.
    #[error("amount cannot be negative")]
    Negative,
    /// Amount exceeds [`Money::MAX`].
    #[error("amount exceeds {}", Money::MAX)]
    Overflow,
    /// Unknown ISO 4217 code.
    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),
}

/// A non-negative monetary amount rounded to two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Largest amount a `NUMERIC(12, 2)` column holds.
    pub const MAX: Self = Self(Decimal::from_parts(3_567_587_327, 232, 0, false, 2));

    /// Create a money amount, rounding half-away-from-zero to 2 decimals.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] for amounts below zero and
    /// [`MoneyError::Overflow`] for amounts above [`Money::MAX`].
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative);
        }
        let rounded =
            amount.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
        if rounded > Self::MAX.0 {
            return Err(MoneyError::Overflow);
        }
        Ok(Self(rounded))
    }

    /// Build from an integer count of minor units (e.g. paise).
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] above [`Money::MAX`].
    pub fn from_minor_units(minor: u64) -> Result<Self, MoneyError> {
        Self::new(Decimal::from(minor) / Decimal::ONE_HUNDRED)
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// The amount in minor units, as payment gateways expect.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the amount does not fit in `i64`.
    pub fn to_minor_units(&self) -> Result<i64, MoneyError> {
        self.0
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|minor| minor.trunc().to_i64())
            .ok_or(MoneyError::Overflow)
    }

    /// `unit_price × quantity`.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] when the product exceeds [`Money::MAX`].
    pub fn times(&self, quantity: u32) -> Result<Self, MoneyError> {
        self.0
            .checked_mul(Decimal::from(quantity))
            .ok_or(MoneyError::Overflow)
            .and_then(Self::new)
    }

    /// Add two amounts.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] when the sum exceeds [`Money::MAX`].
    pub fn checked_add(&self, other: Self) -> Result<Self, MoneyError> {
        self.0
            .checked_add(other.0)
            .ok_or(MoneyError::Overflow)
            .and_then(Self::new)
    }

    /// Sum a sequence of amounts.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] as soon as a running total exceeds
    /// [`Money::MAX`].
    pub fn try_sum(amounts: impl IntoIterator<Item = Self>) -> Result<Self, MoneyError> {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, |acc, amount| acc.checked_add(amount))
    }

    /// Subtract, clamping at zero.
    #[must_use]
    pub fn saturating_sub(&self, other: Self) -> Self {
        if other.0 >= self.0 {
            Self::ZERO
        } else {
            Self(self.0 - other.0)
        }
    }

    /// Whether the amount is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Money {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Money {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let d = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(d)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

/// ISO 4217 currency codes supported for tenant settings and payment links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
    EUR,
    GBP,
    AED,
    SGD,
}

impl CurrencyCode {
    /// The three-letter code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::INR => "INR",
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::AED => "AED",
            Self::SGD => "SGD",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INR" => Ok(Self::INR),
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "AED" => Ok(Self::AED),
            "SGD" => Ok(Self::SGD),
            other => Err(MoneyError::UnsupportedCurrency(other.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_new_rounds_to_cents() {
        let m = Money::new(d("10.005")).unwrap();
        assert_eq!(m.amount(), d("10.01"));
    }

    #[test]
    fn test_new_rejects_negative() {
        assert_eq!(Money::new(d("-0.01")), Err(MoneyError::Negative));
        assert!(Money::new(Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_minor_units() {
        let m = Money::new(d("1499.50")).unwrap();
        assert_eq!(m.to_minor_units().unwrap(), 149_950);
        assert_eq!(Money::from_minor_units(149_950).unwrap(), m);
        assert_eq!(Money::MAX.to_minor_units().unwrap(), 999_999_999_999);
    }

    #[test]
    fn test_times_and_sum() {
        let unit = Money::new(d("2.50")).unwrap();
        let total = Money::try_sum([unit.times(3).unwrap(), unit.times(1).unwrap()]).unwrap();
        assert_eq!(total.amount(), d("10.00"));
        assert_eq!(Money::try_sum([]).unwrap(), Money::ZERO);
    }

    #[test]
    fn test_upper_bound() {
        assert_eq!(Money::MAX.amount(), d("9999999999.99"));
        assert!(Money::new(d("9999999999.99")).is_ok());
        assert_eq!(Money::new(d("10000000000")), Err(MoneyError::Overflow));
        assert_eq!(Money::new(d("9999999999.995")), Err(MoneyError::Overflow));
        assert_eq!(Money::new(Decimal::MAX), Err(MoneyError::Overflow));
        assert_eq!(Money::from_minor_units(u64::MAX), Err(MoneyError::Overflow));
    }

    #[test]
    fn test_arithmetic_past_bound_is_an_error() {
        let cent = Money::new(d("0.01")).unwrap();
        assert_eq!(Money::MAX.times(2), Err(MoneyError::Overflow));
        assert_eq!(Money::MAX.times(u32::MAX), Err(MoneyError::Overflow));
        assert_eq!(Money::MAX.times(1).unwrap(), Money::MAX);
        assert_eq!(Money::MAX.times(0).unwrap(), Money::ZERO);
        assert_eq!(Money::MAX.checked_add(cent), Err(MoneyError::Overflow));
        assert_eq!(Money::try_sum([Money::MAX, Money::MAX]), Err(MoneyError::Overflow));
    }

    #[test]
    fn test_saturating_sub() {
        let a = Money::new(d("5")).unwrap();
        let b = Money::new(d("7")).unwrap();
        assert_eq!(a.saturating_sub(b), Money::ZERO);
        assert_eq!(b.saturating_sub(a).amount(), d("2"));
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("inr".parse::<CurrencyCode>().unwrap(), CurrencyCode::INR);
        assert!("XYZ".parse::<CurrencyCode>().is_err());
    }

    #[test]
    fn test_serde_uses_string_decimal() {
        let m = Money::new(d("12.30")).unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "\"12.30\"");
        assert!(serde_json::from_str::<Money>("\"-1\"").is_err());
        assert!(serde_json::from_str::<Money>("\"79228162514264337593543950335\"").is_err());
        assert!(serde_json::from_str::<Money>("\"10000000000.00\"").is_err());
    }
}
