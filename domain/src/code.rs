//! Reservation code value object.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable 8-character alphanumeric reservation code.
///
/// Codes are the public identity of a reservation: globally unique, never
/// reused, and safe to hand to external providers as an idempotency key.
///
/// # Example
///
/// ```
/// use reserva_domain::ReservationCode;
///
/// let code = ReservationCode::new("AB12CD34").unwrap();
/// assert_eq!(code.as_str(), "AB12CD34");
/// assert!(ReservationCode::new("too-long-and-symbols").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReservationCode(String);

impl ReservationCode {
    /// Fixed length of every reservation code.
    pub const LENGTH: usize = 8;

    /// Validate and wrap a raw code.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidCode`] unless the value is exactly
    /// eight ASCII alphanumeric characters.
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.len() == Self::LENGTH && value.chars().all(|c| c.is_ascii_alphanumeric()) {
            Ok(Self(value))
        } else {
            Err(DomainError::InvalidCode(value))
        }
    }

    /// Borrow the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReservationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ReservationCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ReservationCode> for String {
    fn from(code: ReservationCode) -> Self {
        code.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn accepts_eight_alphanumeric_chars() {
        let code = ReservationCode::new("aB3xY9Q0").unwrap();
        assert_eq!(code.as_str(), "aB3xY9Q0");
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(ReservationCode::new("ABC123").is_err());
        assert!(ReservationCode::new("ABC123456").is_err());
        assert!(ReservationCode::new("").is_err());
    }

    #[test]
    fn rejects_non_alphanumeric() {
        assert!(ReservationCode::new("AB12-D34").is_err());
        assert!(ReservationCode::new("AB12CD3 ").is_err());
        assert!(ReservationCode::new("ÅB12CD34").is_err());
    }

    #[test]
    fn serde_roundtrip_as_plain_string() {
        let code = ReservationCode::new("AB12CD34").unwrap();
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"AB12CD34\"");
        let back: ReservationCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, code);
    }

    #[test]
    fn deserializing_invalid_code_fails() {
        let result: Result<ReservationCode, _> = serde_json::from_str("\"nope\"");
        assert!(result.is_err());
    }
}
