// Request validation helpers

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{ApiError, FieldError};

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
            .expect("email regex is valid");
    static ref DIGITS_RE: Regex = Regex::new(r"^[0-9]+$").expect("digits regex is valid");
    static ref PHONE_RE: Regex = Regex::new(r"^\+?[0-9 ()-]{7,20}$").expect("phone regex is valid");
}

/// Largest amount accepted in a single request, in minor units
pub const MAX_AMOUNT: i64 = 100_000_000_000;

/// Collects field errors so a request reports all of them at once
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) -> &mut Self {
        if !ok {
            self.errors.push(FieldError::new(field, message));
        }
        self
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(is_valid_email(value), field, "must be a valid email address")
    }

    pub fn length(&mut self, field: &str, value: &str, min: usize, max: usize) -> &mut Self {
        let len = value.trim().chars().count();
        self.check(
            (min..=max).contains(&len),
            field,
            &format!("must be between {} and {} characters", min, max),
        )
    }

    pub fn password(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(
            is_strong_password(value),
            field,
            "must be at least 8 characters and contain a letter and a digit",
        )
    }

    pub fn positive_amount(&mut self, field: &str, value: i64) -> &mut Self {
        self.check(
            value > 0 && value <= MAX_AMOUNT,
            field,
            "must be a positive amount",
        )
    }

    pub fn percentage(&mut self, field: &str, value: i32) -> &mut Self {
        self.check((0..=100).contains(&value), field, "must be between 0 and 100")
    }

    pub fn digits(&mut self, field: &str, value: &str, min: usize, max: usize) -> &mut Self {
        let ok = DIGITS_RE.is_match(value) && (min..=max).contains(&value.len());
        self.check(
            ok,
            field,
            &format!("must be {} to {} digits", min, max),
        )
    }

    pub fn phone(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(PHONE_RE.is_match(value), field, "must be a valid phone number")
    }

    pub fn finish(&mut self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(std::mem::take(&mut self.errors)))
        }
    }
}

pub fn is_valid_email(value: &str) -> bool {
    value.len() <= 254 && EMAIL_RE.is_match(value)
}

pub fn is_strong_password(value: &str) -> bool {
    value.chars().count() >= 8
        && value.len() <= 128
        && value.chars().any(|c| c.is_ascii_alphabetic())
        && value.chars().any(|c| c.is_ascii_digit())
}

/// Lowercased, trimmed email used for lookups and storage
pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("a.b+tag@sub.example.co"));
        assert!(!is_valid_email("alice@"));
        assert!(!is_valid_email("alice.example.com"));
        assert!(!is_valid_email("alice@example"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn passwords() {
        assert!(is_strong_password("hunter22a"));
        assert!(!is_strong_password("short1"));
        assert!(!is_strong_password("onlyletters"));
        assert!(!is_strong_password("1234567890"));
    }

    #[test]
    fn collects_every_failure() {
        let err = Validator::new()
            .email("email", "nope")
            .password("password", "weak")
            .length("full_name", "Ann", 1, 100)
            .finish()
            .unwrap_err();

        match err {
            ApiError::Validation(errors) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["email", "password"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn length_ignores_surrounding_whitespace() {
        assert!(Validator::new().length("name", "   ", 1, 10).finish().is_err());
        assert!(Validator::new().length("name", " ok ", 1, 2).finish().is_ok());
    }

    #[test]
    fn amounts_and_percentages() {
        assert!(Validator::new().positive_amount("amount", 1).finish().is_ok());
        assert!(Validator::new().positive_amount("amount", 0).finish().is_err());
        assert!(Validator::new().positive_amount("amount", -10).finish().is_err());
        assert!(Validator::new().percentage("share", 100).finish().is_ok());
        assert!(Validator::new().percentage("share", 101).finish().is_err());
    }

    #[test]
    fn digit_fields() {
        assert!(Validator::new().digits("last4", "4242", 4, 4).finish().is_ok());
        assert!(Validator::new().digits("last4", "42a2", 4, 4).finish().is_err());
        assert!(Validator::new().digits("account_number", "123", 4, 34).finish().is_err());
    }

    #[test]
    fn normalizes_email() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }
}
