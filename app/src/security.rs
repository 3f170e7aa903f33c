//! Input sanitation and PCI storage rules.
//!
//! Free-text fields coming over the HTTP boundary are sanitized (control
//! characters and XSS-shaped fragments stripped) and rejected when they
//! carry SQL-injection-shaped content. Customer snapshots additionally pass
//! the PCI filter before persistence: CVV-like keys are dropped, raw card
//! numbers are rejected outright, and card tokens must look like tokens.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static XSS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    vec![
        Regex::new(r"(?is)<\s*script[^>]*>.*?<\s*/\s*script\s*>").unwrap(),
        Regex::new(r"(?i)javascript:").unwrap(),
        Regex::new(r"(?i)on\w+\s*=").unwrap(),
    ]
});

static SQL_INJECTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(
        r"(?is)(--|/\*|\*/|\bunion\s+select\b|\bdrop\s+table\b|\btruncate\s+table\b|'\s*(or|and)\s+[\w']+\s*=\s*[\w']+|;\s*(select|insert|update|delete|drop|alter|truncate|union)\b)",
    )
    .unwrap()
});

static CARD_NUMBER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^\d{12,19}$").unwrap()
});

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^(tok_|pm_|card_)[A-Za-z0-9_]+$").unwrap()
});

/// Violations raised by the sanitizer and the PCI filter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecurityError {
    /// The input carries a SQL-injection-shaped fragment.
    #[error("input contains a possible SQL injection pattern")]
    SqlInjection,

    /// A raw primary account number reached the persistence boundary.
    #[error("card numbers must be tokenized before persistence")]
    RawCardNumber,

    /// A field that names itself a token does not look like one.
    #[error("card token format is invalid")]
    InvalidCardToken,
}

/// Strip control characters and XSS-shaped content from a text field.
#[must_use]
pub fn sanitize_text(value: &str) -> String {
    let mut cleaned: String = value.chars().filter(|c| !c.is_control()).collect();
    cleaned = cleaned.trim().to_string();
    for pattern in XSS_PATTERNS.iter() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }
    cleaned.replace(['<', '>'], "")
}

/// Reject SQL-injection-shaped text.
///
/// # Errors
///
/// Returns [`SecurityError::SqlInjection`] when a suspicious fragment is
/// found.
pub fn validate_text_is_safe(value: &str) -> Result<(), SecurityError> {
    if SQL_INJECTION_PATTERN.is_match(value) {
        Err(SecurityError::SqlInjection)
    } else {
        Ok(())
    }
}

/// Sanitize and validate a text field in one step.
///
/// # Errors
///
/// Returns [`SecurityError::SqlInjection`] when the cleaned value still
/// carries a suspicious fragment.
pub fn sanitize_and_validate_text(value: &str) -> Result<String, SecurityError> {
    let cleaned = sanitize_text(value);
    validate_text_is_safe(&cleaned)?;
    Ok(cleaned)
}

/// Recursively sanitize and validate every string in a JSON payload.
///
/// # Errors
///
/// Returns [`SecurityError::SqlInjection`] for the first offending leaf.
pub fn sanitize_payload(payload: serde_json::Value) -> Result<serde_json::Value, SecurityError> {
    use serde_json::Value;
    match payload {
        Value::Object(map) => {
            let mut cleaned = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                cleaned.insert(key, sanitize_payload(value)?);
            }
            Ok(Value::Object(cleaned))
        }
        Value::Array(items) => Ok(Value::Array(
            items
                .into_iter()
                .map(sanitize_payload)
                .collect::<Result<_, _>>()?,
        )),
        Value::String(s) => Ok(Value::String(sanitize_and_validate_text(&s)?)),
        other => Ok(other),
    }
}

/// Enforce PCI storage rules on a snapshot payload.
///
/// - `cvv` / `cvc` / `security_code` keys are dropped wherever they appear
/// - card-number-shaped values under card-ish keys are rejected
/// - token fields must match the `tok_` / `pm_` / `card_` shape
///
/// # Errors
///
/// Returns [`SecurityError::RawCardNumber`] or
/// [`SecurityError::InvalidCardToken`] on violation.
pub fn enforce_pci_storage_rules(
    payload: serde_json::Value,
) -> Result<serde_json::Value, SecurityError> {
    use serde_json::Value;
    match payload {
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                let lowered = key.to_lowercase();
                if matches!(lowered.as_str(), "cvv" | "cvc" | "security_code") {
                    continue;
                }

                if looks_like_card_number_field(&lowered) {
                    let value_str = value_as_trimmed_string(&value);
                    if CARD_NUMBER_PATTERN.is_match(&value_str) {
                        return Err(SecurityError::RawCardNumber);
                    }
                    if looks_like_token_field(&lowered) && !TOKEN_PATTERN.is_match(&value_str) {
                        return Err(SecurityError::InvalidCardToken);
                    }
                    sanitized.insert(key, value);
                    continue;
                }

                sanitized.insert(key, enforce_pci_storage_rules(value)?);
            }
            Ok(Value::Object(sanitized))
        }
        Value::Array(items) => Ok(Value::Array(
            items
                .into_iter()
                .map(enforce_pci_storage_rules)
                .collect::<Result<_, _>>()?,
        )),
        other => Ok(other),
    }
}

fn looks_like_card_number_field(key: &str) -> bool {
    ["card", "pan", "account_number"]
        .iter()
        .any(|token| key.contains(token))
}

fn looks_like_token_field(key: &str) -> bool {
    key.contains("token")
}

fn value_as_trimmed_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    }
}
