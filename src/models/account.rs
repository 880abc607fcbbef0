// Bank account and payment method models

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BankAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bank_name: String,
    pub account_holder: String,
    pub account_last4: String,
    pub routing_number: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBankAccountRequest {
    pub bank_name: String,
    pub account_holder: String,
    pub account_number: String,
    pub routing_number: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBankAccountRequest {
    pub bank_name: Option<String>,
    pub account_holder: Option<String>,
    pub routing_number: Option<String>,
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethodKind {
    Card,
    BankDebit,
    Wallet,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PaymentMethod {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: PaymentMethodKind,
    pub provider: String,
    pub last4: String,
    pub expiry_month: Option<i32>,
    pub expiry_year: Option<i32>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentMethod {
    /// A card is usable through the last day of its expiry month.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match (self.expiry_month, self.expiry_year) {
            (Some(month), Some(year)) => is_expiry_past(month, year, now),
            _ => false,
        }
    }
}

/// Years a card expiry may name
pub const EXPIRY_YEARS: std::ops::RangeInclusive<i32> = 2000..=2100;

pub fn is_expiry_past(month: i32, year: i32, now: DateTime<Utc>) -> bool {
    let current = i64::from(now.year()) * 12 + i64::from(now.month());
    i64::from(year) * 12 + i64::from(month) < current
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentMethodRequest {
    pub kind: PaymentMethodKind,
    pub provider: String,
    pub last4: String,
    pub expiry_month: Option<i32>,
    pub expiry_year: Option<i32>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePaymentMethodRequest {
    pub provider: Option<String>,
    pub expiry_month: Option<i32>,
    pub expiry_year: Option<i32>,
    pub is_default: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn card(month: Option<i32>, year: Option<i32>) -> PaymentMethod {
        let now = Utc::now();
        PaymentMethod {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            kind: PaymentMethodKind::Card,
            provider: "visa".to_string(),
            last4: "4242".to_string(),
            expiry_month: month,
            expiry_year: year,
            is_default: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn card_valid_through_expiry_month() {
        let now = Utc.with_ymd_and_hms(2026, 3, 31, 23, 0, 0).unwrap();
        assert!(!card(Some(3), Some(2026)).is_expired(now));
        assert!(card(Some(2), Some(2026)).is_expired(now));
        assert!(card(Some(12), Some(2025)).is_expired(now));
        assert!(!card(Some(1), Some(2027)).is_expired(now));
    }

    #[test]
    fn extreme_years_do_not_overflow() {
        let now = Utc.with_ymd_and_hms(2026, 3, 31, 23, 0, 0).unwrap();
        assert!(!is_expiry_past(12, i32::MAX, now));
        assert!(is_expiry_past(1, i32::MIN, now));
        assert!(!is_expiry_past(i32::MAX, 2026, now));
    }

    #[test]
    fn method_without_expiry_never_expires() {
        let now = Utc::now();
        assert!(!card(None, None).is_expired(now));
        assert!(!card(Some(1), None).is_expired(now));
    }
}
