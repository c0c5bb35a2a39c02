//! Phone number type.
//!
//! WhatsApp identifies people by their phone number in E.164 form without the
//! leading `+` (the `wa_id`). Contacts are stored in exactly that shape so that
//! an inbound message can be matched to an existing contact by string equality.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneNumberError {
    /// Nothing left after stripping formatting characters.
    #[error("phone number cannot be empty")]
    Empty,
    /// A character other than a digit or accepted separator was found.
    #[error("phone number contains invalid character '{0}'")]
    InvalidCharacter(char),
    /// Too few or too many digits for E.164.
    #[error("phone number must have between {min} and {max} digits (got {got})")]
    InvalidLength {
        /// Minimum digit count.
        min: usize,
        /// Maximum digit count.
        max: usize,
        /// Digits found.
        got: usize,
    },
}

/// A normalized international phone number (digits only, no `+`).
///
/// ```
/// use parley_core::PhoneNumber;
///
/// let phone = PhoneNumber::parse("+91 (98765) 43-210").unwrap();
/// assert_eq!(phone.as_str(), "919876543210");
/// assert_eq!(phone.to_e164(), "+919876543210");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Minimum digits accepted.
    pub const MIN_DIGITS: usize = 8;
    /// Maximum digits allowed by E.164.
    pub const MAX_DIGITS: usize = 15;

    /// Parse a phone number, stripping spaces, dashes, dots, parentheses and a
    /// single leading `+`.
    ///
    /// # Errors
    ///
    /// Returns [`PhoneNumberError`] if the remaining characters are not all
    /// digits or the digit count is outside 8..=15.
    pub fn parse(input: &str) -> Result<Self, PhoneNumberError> {
        let trimmed = input.trim();
        let body = trimmed.strip_prefix('+').unwrap_or(trimmed);

        let mut digits = String::with_capacity(body.len());
        for c in body.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' | '.' | '(' | ')' => {}
                other => return Err(PhoneNumberError::InvalidCharacter(other)),
            }
        }

        if digits.is_empty() {
            return Err(PhoneNumberError::Empty);
        }
        if !(Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&digits.len()) {
            return Err(PhoneNumberError::InvalidLength {
                min: Self::MIN_DIGITS,
                max: Self::MAX_DIGITS,
                got: digits.len(),
            });
        }

        Ok(Self(digits))
    }

    /// The digits-only representation used by the WhatsApp API.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The number with a leading `+`.
    #[must_use]
    pub fn to_e164(&self) -> String {
        format!("+{}", self.0)
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PhoneNumber {
    type Err = PhoneNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for PhoneNumber {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for PhoneNumber {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(&s)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for PhoneNumber {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wa_id_unchanged() {
        let phone = PhoneNumber::parse("15551234567").unwrap();
        assert_eq!(phone.as_str(), "15551234567");
    }

    #[test]
    fn test_parse_strips_formatting() {
        let phone = PhoneNumber::parse(" +1 (555) 123-4567 ").unwrap();
        assert_eq!(phone.as_str(), "15551234567");
    }

    #[test]
    fn test_parse_rejects_letters() {
        assert_eq!(
            PhoneNumber::parse("+1 555 CALL NOW"),
            Err(PhoneNumberError::InvalidCharacter('C'))
        );
    }

    #[test]
    fn test_parse_rejects_inner_plus() {
        assert_eq!(
            PhoneNumber::parse("1+5551234567"),
            Err(PhoneNumberError::InvalidCharacter('+'))
        );
    }

    #[test]
    fn test_parse_length_bounds() {
        assert!(matches!(
            PhoneNumber::parse("1234567"),
            Err(PhoneNumberError::InvalidLength { got: 7, .. })
        ));
        assert!(matches!(
            PhoneNumber::parse("1234567890123456"),
            Err(PhoneNumberError::InvalidLength { got: 16, .. })
        ));
        assert_eq!(PhoneNumber::parse("+ ()"), Err(PhoneNumberError::Empty));
    }

    #[test]
    fn test_e164() {
        let phone = PhoneNumber::parse("447700900123").unwrap();
        assert_eq!(phone.to_e164(), "+447700900123");
    }
}
