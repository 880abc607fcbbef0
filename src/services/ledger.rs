// Balance derivation and withdrawal admission

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::database::{DbPool, TransactionRepo, UserRepo};
use crate::error::ApiError;
use crate::models::{
    LedgerTotal, NewTransaction, Transaction, TransactionStatus, TransactionType,
};

/// Derived balance. Nothing here is stored; it is recomputed from the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub total_profit: i64,
    pub completed_withdrawals: i64,
    pub pending_withdrawals: i64,
    pub available: i64,
}

impl Balance {
    pub fn from_totals(totals: &[LedgerTotal]) -> Self {
        let mut balance = Balance::default();
        for row in totals {
            match (row.tx_type, row.status) {
                (TransactionType::Profit, TransactionStatus::Completed) => {
                    balance.total_profit += row.total
                }
                (TransactionType::Withdrawal, TransactionStatus::Completed) => {
                    balance.completed_withdrawals += row.total
                }
                (TransactionType::Withdrawal, TransactionStatus::Pending) => {
                    balance.pending_withdrawals += row.total
                }
                _ => {}
            }
        }
        balance.available =
            balance.total_profit - balance.completed_withdrawals - balance.pending_withdrawals;
        balance
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WithdrawalError {
    #[error("Withdrawal amount must be positive")]
    NonPositive,

    #[error("Minimum withdrawal amount is {0}")]
    BelowMinimum(i64),

    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientFunds { available: i64, requested: i64 },
}

impl From<WithdrawalError> for ApiError {
    fn from(err: WithdrawalError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

/// Admission check for a withdrawal of `amount` against `balance`
pub fn admit_withdrawal(
    balance: &Balance,
    amount: i64,
    minimum: i64,
) -> Result<(), WithdrawalError> {
    if amount <= 0 {
        return Err(WithdrawalError::NonPositive);
    }
    if amount < minimum {
        return Err(WithdrawalError::BelowMinimum(minimum));
    }
    if amount > balance.available {
        return Err(WithdrawalError::InsufficientFunds {
            available: balance.available,
            requested: amount,
        });
    }
    Ok(())
}

pub async fn balance(pool: &DbPool, user_id: Uuid) -> sqlx::Result<Balance> {
    let totals = TransactionRepo::totals(pool, user_id).await?;
    Ok(Balance::from_totals(&totals))
}

/// Check the balance and record a PENDING withdrawal. The user row stays
/// locked from the balance read until commit, so concurrent requests from
/// the same user are admitted one at a time.
pub async fn request_withdrawal(
    pool: &DbPool,
    user_id: Uuid,
    amount: i64,
    bank_account_id: Uuid,
    minimum: i64,
) -> Result<Transaction, ApiError> {
    let mut tx = pool.begin().await?;

    if !UserRepo::lock(&mut *tx, user_id).await? {
        return Err(ApiError::NotFound("User"));
    }

    let totals = TransactionRepo::totals(&mut *tx, user_id).await?;
    let balance = Balance::from_totals(&totals);
    admit_withdrawal(&balance, amount, minimum)?;

    let mut entry = NewTransaction::new(
        user_id,
        TransactionType::Withdrawal,
        TransactionStatus::Pending,
        amount,
    );
    entry.bank_account_id = Some(bank_account_id);
    entry.description = Some("Withdrawal to bank account".to_string());

    let withdrawal = TransactionRepo::insert(&mut *tx, &entry).await?;
    tx.commit().await?;

    info!(
        user_id = %user_id,
        amount,
        available_before = balance.available,
        "Withdrawal {} accepted",
        withdrawal.id
    );
    Ok(withdrawal)
}
