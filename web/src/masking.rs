//! Secret masking for log output.
//!
//! Anything that might carry customer or credential material is passed
//! through [`mask_secrets`] before it reaches a log line: email local parts
//! are shortened, card-length digit runs are reduced to their last four
//! digits, and bearer/API tokens are blanked.

use regex::Regex;
use std::sync::LazyLock;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"([A-Za-z0-9._%+-])[A-Za-z0-9._%+-]*@([A-Za-z0-9.-]+)").unwrap()
});

static CARD_DIGITS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"\b\d{8,15}(\d{4})\b").unwrap()
});

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"(?i)\b(bearer\s+|sk_|pk_|tok_|api[_-]?key[=:]\s*)[A-Za-z0-9._-]+").unwrap()
});

/// Mask email local parts: `ana.perez@example.com` → `a***@example.com`.
#[must_use]
pub fn mask_email(text: &str) -> String {
    EMAIL_PATTERN.replace_all(text, "$1***@$2").into_owned()
}

/// Mask card-length digit runs, keeping the last four digits.
#[must_use]
pub fn mask_card_digits(text: &str) -> String {
    CARD_DIGITS_PATTERN
        .replace_all(text, "************$1")
        .into_owned()
}

/// Blank bearer tokens and API-key-looking values.
#[must_use]
pub fn mask_tokens(text: &str) -> String {
    TOKEN_PATTERN.replace_all(text, "$1[REDACTED]").into_owned()
}

/// Apply every masking rule.
#[must_use]
pub fn mask_secrets(text: &str) -> String {
    mask_tokens(&mask_card_digits(&mask_email(text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_email_local_part() {
        assert_eq!(
            mask_email("contact ana.perez@example.com please"),
            "contact a***@example.com please"
        );
    }

    #[test]
    fn masks_card_digit_runs_keeping_last_four() {
        assert_eq!(
            mask_card_digits("card 4111111111111111 declined"),
            "card ************1111 declined"
        );
    }

    #[test]
    fn short_digit_runs_are_left_alone() {
        assert_eq!(mask_card_digits("office 12345"), "office 12345");
    }

    #[test]
    fn masks_bearer_tokens() {
        let masked = mask_tokens("Authorization: Bearer abc.def.ghi");
        assert!(!masked.contains("abc.def.ghi"));
        assert!(masked.contains("[REDACTED]"));
    }

    #[test]
    fn mask_secrets_applies_all_rules() {
        let input = "ana@example.com paid with 4111111111111111 via sk_live_abc123";
        let masked = mask_secrets(input);
        assert!(!masked.contains("ana@"));
        assert!(!masked.contains("4111111111111111"));
        assert!(!masked.contains("sk_live_abc123"));
    }
}
