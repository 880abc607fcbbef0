// Ledger transaction queries

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::DbPool;
use crate::models::{LedgerTotal, NewTransaction, Transaction, TransactionStatus, TransactionType};

const TX_COLUMNS: &str = "id, user_id, tx_type, status, amount, funding_id, bank_account_id, \
     payment_method_id, reference, description, created_at, updated_at";

pub struct TransactionRepo;

impl TransactionRepo {
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        new: &NewTransaction,
    ) -> sqlx::Result<Transaction> {
        sqlx::query_as::<_, Transaction>(&format!(
            "INSERT INTO transactions (id, user_id, tx_type, status, amount, funding_id, \
                bank_account_id, payment_method_id, reference, description) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {TX_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.tx_type)
        .bind(new.status)
        .bind(new.amount)
        .bind(new.funding_id)
        .bind(new.bank_account_id)
        .bind(new.payment_method_id)
        .bind(new.reference.as_deref())
        .bind(new.description.as_deref())
        .fetch_one(executor)
        .await
    }

    pub async fn list(
        pool: &DbPool,
        user_id: Uuid,
        tx_type: Option<TransactionType>,
        status: Option<TransactionStatus>,
        limit: i64,
        offset: i64,
    ) -> sqlx::Result<(Vec<Transaction>, i64)> {
        let transactions = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TX_COLUMNS} FROM transactions \
             WHERE user_id = $1 \
               AND ($2::transaction_type IS NULL OR tx_type = $2) \
               AND ($3::transaction_status IS NULL OR status = $3) \
             ORDER BY created_at DESC LIMIT $4 OFFSET $5"
        ))
        .bind(user_id)
        .bind(tx_type)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM transactions \
             WHERE user_id = $1 \
               AND ($2::transaction_type IS NULL OR tx_type = $2) \
               AND ($3::transaction_status IS NULL OR status = $3)",
        )
        .bind(user_id)
        .bind(tx_type)
        .bind(status)
        .fetch_one(pool)
        .await?;

        Ok((transactions, total))
    }

    pub async fn find(pool: &DbPool, user_id: Uuid, id: Uuid) -> sqlx::Result<Option<Transaction>> {
        sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TX_COLUMNS} FROM transactions WHERE user_id = $1 AND id = $2"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Amount totals per (type, status) for one user
    pub async fn totals<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
    ) -> sqlx::Result<Vec<LedgerTotal>> {
        sqlx::query_as::<_, LedgerTotal>(
            "SELECT tx_type, status, COALESCE(SUM(amount), 0)::BIGINT AS total \
             FROM transactions WHERE user_id = $1 GROUP BY tx_type, status",
        )
        .bind(user_id)
        .fetch_all(executor)
        .await
    }

    /// PENDING -> CANCELLED for one of the user's withdrawals
    pub async fn cancel_pending_withdrawal(
        pool: &DbPool,
        user_id: Uuid,
        id: Uuid,
    ) -> sqlx::Result<Option<Transaction>> {
        sqlx::query_as::<_, Transaction>(&format!(
            "UPDATE transactions SET status = 'CANCELLED', updated_at = NOW() \
             WHERE user_id = $1 AND id = $2 AND tx_type = 'WITHDRAWAL' AND status = 'PENDING' \
             RETURNING {TX_COLUMNS}"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Complete every PENDING withdrawal created at or before `cutoff`
    pub async fn settle_withdrawals(
        pool: &DbPool,
        cutoff: DateTime<Utc>,
    ) -> sqlx::Result<Vec<Transaction>> {
        sqlx::query_as::<_, Transaction>(&format!(
            "UPDATE transactions SET status = 'COMPLETED', updated_at = NOW() \
             WHERE tx_type = 'WITHDRAWAL' AND status = 'PENDING' AND created_at <= $1 \
             RETURNING {TX_COLUMNS}"
        ))
        .bind(cutoff)
        .fetch_all(pool)
        .await
    }

    /// COMPLETED PROFIT entries since `since`, oldest first
    pub async fn profits_since(
        pool: &DbPool,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> sqlx::Result<Vec<Transaction>> {
        sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TX_COLUMNS} FROM transactions \
             WHERE user_id = $1 AND tx_type = 'PROFIT' AND status = 'COMPLETED' AND created_at >= $2 \
             ORDER BY created_at"
        ))
        .bind(user_id)
        .bind(since)
        .fetch_all(pool)
        .await
    }

    pub async fn changed_since(
        pool: &DbPool,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> sqlx::Result<Vec<Transaction>> {
        sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TX_COLUMNS} FROM transactions \
             WHERE user_id = $1 AND ($2::TIMESTAMPTZ IS NULL OR updated_at >= $2) \
             ORDER BY updated_at"
        ))
        .bind(user_id)
        .bind(since)
        .fetch_all(pool)
        .await
    }
}
