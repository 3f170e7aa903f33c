//! Provider request records.
//!
//! One [`ProviderRequest`] row is written for every external response the
//! service receives. Rows are immutable once written; the reconciler derives
//! the reservation's lifecycle status from the accumulated SUCCESS rows.

use crate::code::ReservationCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which external leg a provider request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderRequestType {
    /// Payment provider leg.
    Payment,
    /// Supplier booking leg.
    Booking,
}

impl ProviderRequestType {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Payment => "PAYMENT",
            Self::Booking => "BOOKING",
        }
    }

    /// Parse a database string representation; `None` for unknown values.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PAYMENT" => Some(Self::Payment),
            "BOOKING" => Some(Self::Booking),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderRequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome recorded for a provider request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderRequestStatus {
    /// The provider confirmed the leg.
    Success,
    /// The provider rejected the leg or the call failed.
    Failed,
}

impl ProviderRequestStatus {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }

    /// Parse a database string representation; `None` for unknown values.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SUCCESS" => Some(Self::Success),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Immutable record of one external provider response.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    /// Reservation the response belongs to.
    pub reservation_code: ReservationCode,
    /// Identifier of the external provider (e.g. `"stripe"`).
    pub provider_code: String,
    /// Which leg this response concerns.
    pub request_type: ProviderRequestType,
    /// Payload sent to the provider, if captured.
    pub request_payload: Option<serde_json::Value>,
    /// Payload received from the provider, if any.
    pub response_payload: Option<serde_json::Value>,
    /// Recorded outcome.
    pub status: ProviderRequestStatus,
    /// When the provider responded (wall-clock UTC).
    pub responded_at: DateTime<Utc>,
}
