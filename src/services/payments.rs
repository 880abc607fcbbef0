// Mock payment gateway used for subscription charges

use chrono::{DateTime, Utc};
use rand::RngCore;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::models::PaymentMethod;

/// Largest amount accepted in one charge, minor units
pub const DEFAULT_CHARGE_LIMIT: i64 = 10_000_000;

/// Provider name that always declines, for exercising failure paths
pub const DECLINING_PROVIDER: &str = "decline";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaymentError {
    #[error("No payment method available")]
    NoPaymentMethod,

    #[error("Payment method has expired")]
    Expired,

    #[error("Amount {amount} exceeds the single charge limit of {limit}")]
    OverLimit { amount: i64, limit: i64 },

    #[error("Payment declined by provider")]
    Declined,
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeReceipt {
    pub reference: String,
    pub amount: i64,
}

#[derive(Debug, Clone)]
pub struct PaymentGateway {
    charge_limit: i64,
}

impl Default for PaymentGateway {
    fn default() -> Self {
        Self::new(DEFAULT_CHARGE_LIMIT)
    }
}

impl PaymentGateway {
    pub fn new(charge_limit: i64) -> Self {
        Self { charge_limit }
    }

    pub fn charge(
        &self,
        method: Option<&PaymentMethod>,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<ChargeReceipt, PaymentError> {
        let method = method.ok_or(PaymentError::NoPaymentMethod)?;

        let outcome = if method.is_expired(now) {
            Err(PaymentError::Expired)
        } else if amount > self.charge_limit {
            Err(PaymentError::OverLimit {
                amount,
                limit: self.charge_limit,
            })
        } else if method.provider.eq_ignore_ascii_case(DECLINING_PROVIDER) {
            Err(PaymentError::Declined)
        } else {
            Ok(ChargeReceipt {
                reference: new_reference(),
                amount,
            })
        };

        match &outcome {
            Ok(receipt) => info!(
                "Charged {} to payment method {} ({})",
                amount, method.id, receipt.reference
            ),
            Err(e) => warn!("Charge of {} to payment method {} failed: {}", amount, method.id, e),
        }
        outcome
    }
}

fn new_reference() -> String {
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("ch_{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaymentMethodKind;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn method(provider: &str, month: Option<i32>, year: Option<i32>) -> PaymentMethod {
        PaymentMethod {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            kind: PaymentMethodKind::Card,
            provider: provider.to_string(),
            last4: "4242".to_string(),
            expiry_month: month,
            expiry_year: year,
            is_default: true,
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn successful_charge_returns_reference() {
        let gateway = PaymentGateway::default();
        let receipt = gateway
            .charge(Some(&method("visa", Some(12), Some(2030))), 1_999, now())
            .unwrap();
        assert_eq!(receipt.amount, 1_999);
        assert!(receipt.reference.starts_with("ch_"));
        assert_eq!(receipt.reference.len(), 3 + 24);
    }

    #[test]
    fn missing_method_is_declined() {
        let gateway = PaymentGateway::default();
        assert_eq!(gateway.charge(None, 100, now()), Err(PaymentError::NoPaymentMethod));
    }

    #[test]
    fn expired_card_is_declined() {
        let gateway = PaymentGateway::default();
        let card = method("visa", Some(5), Some(2025));
        assert_eq!(gateway.charge(Some(&card), 100, now()), Err(PaymentError::Expired));
    }

    #[test]
    fn over_limit_is_declined() {
        let gateway = PaymentGateway::new(5_000);
        let card = method("visa", None, None);
        assert!(gateway.charge(Some(&card), 5_000, now()).is_ok());
        assert_eq!(
            gateway.charge(Some(&card), 5_001, now()),
            Err(PaymentError::OverLimit {
                amount: 5_001,
                limit: 5_000
            })
        );
    }

    #[test]
    fn declining_provider() {
        let gateway = PaymentGateway::default();
        let card = method("Decline", None, None);
        assert_eq!(gateway.charge(Some(&card), 100, now()), Err(PaymentError::Declined));
    }
}
