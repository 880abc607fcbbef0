// Ledger transaction models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Profit,
    Subscription,
    Refund,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

/// Ledger entry. Rows are never edited apart from their status.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    pub amount: i64,
    pub funding_id: Option<Uuid>,
    pub bank_account_id: Option<Uuid>,
    pub payment_method_id: Option<Uuid>,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new ledger entry
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    pub amount: i64,
    pub funding_id: Option<Uuid>,
    pub bank_account_id: Option<Uuid>,
    pub payment_method_id: Option<Uuid>,
    pub reference: Option<String>,
    pub description: Option<String>,
}

impl NewTransaction {
    pub fn new(
        user_id: Uuid,
        tx_type: TransactionType,
        status: TransactionStatus,
        amount: i64,
    ) -> Self {
        Self {
            user_id,
            tx_type,
            status,
            amount,
            funding_id: None,
            bank_account_id: None,
            payment_method_id: None,
            reference: None,
            description: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    #[serde(rename = "type")]
    pub tx_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub amount: i64,
    pub bank_account_id: Option<Uuid>,
}

/// Sum of amounts for one (type, status) pair
#[derive(Debug, Clone, Copy, FromRow)]
pub struct LedgerTotal {
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    pub total: i64,
}
