// Bank account and payment method queries
//
// Both collections keep at most one default row per user. Every default change
// runs in a transaction that first locks the owning user row, and the partial
// unique indexes in the schema reject anything that slips past.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Postgres, Transaction};
use uuid::Uuid;

use super::{DbPool, UserRepo};
use crate::models::{
    BankAccount, CreateBankAccountRequest, CreatePaymentMethodRequest, PaymentMethod,
    UpdateBankAccountRequest, UpdatePaymentMethodRequest,
};

const BANK_COLUMNS: &str = "id, user_id, bank_name, account_holder, account_last4, \
     routing_number, is_default, created_at, updated_at";

const METHOD_COLUMNS: &str = "id, user_id, kind, provider, last4, expiry_month, expiry_year, \
     is_default, created_at, updated_at";

/// Make `id` the only default row of `table` for `user_id`.
/// Caller holds the user lock.
async fn switch_default(
    conn: &mut PgConnection,
    table: &str,
    user_id: Uuid,
    id: Uuid,
) -> sqlx::Result<()> {
    sqlx::query(&format!(
        "UPDATE {table} SET is_default = FALSE, updated_at = NOW() \
         WHERE user_id = $1 AND id <> $2 AND is_default"
    ))
    .bind(user_id)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(&format!(
        "UPDATE {table} SET is_default = TRUE, updated_at = NOW() WHERE user_id = $1 AND id = $2"
    ))
    .bind(user_id)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// After deleting the default row, promote the most recent remaining one.
async fn promote_latest(conn: &mut PgConnection, table: &str, user_id: Uuid) -> sqlx::Result<()> {
    sqlx::query(&format!(
        "UPDATE {table} SET is_default = TRUE, updated_at = NOW() WHERE id = (\
            SELECT id FROM {table} WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1\
         ) AND NOT EXISTS (SELECT 1 FROM {table} WHERE user_id = $1 AND is_default)"
    ))
    .bind(user_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn has_rows(conn: &mut PgConnection, table: &str, user_id: Uuid) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>(&format!(
        "SELECT EXISTS (SELECT 1 FROM {table} WHERE user_id = $1)"
    ))
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await
}

async fn begin_locked(pool: &DbPool, user_id: Uuid) -> sqlx::Result<Transaction<'static, Postgres>> {
    let mut tx = pool.begin().await?;
    UserRepo::lock(&mut *tx, user_id).await?;
    Ok(tx)
}

pub struct BankAccountRepo;

impl BankAccountRepo {
    pub async fn list(pool: &DbPool, user_id: Uuid) -> sqlx::Result<Vec<BankAccount>> {
        sqlx::query_as::<_, BankAccount>(&format!(
            "SELECT {BANK_COLUMNS} FROM bank_accounts WHERE user_id = $1 \
             ORDER BY is_default DESC, created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find(pool: &DbPool, user_id: Uuid, id: Uuid) -> sqlx::Result<Option<BankAccount>> {
        sqlx::query_as::<_, BankAccount>(&format!(
            "SELECT {BANK_COLUMNS} FROM bank_accounts WHERE user_id = $1 AND id = $2"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_default(pool: &DbPool, user_id: Uuid) -> sqlx::Result<Option<BankAccount>> {
        sqlx::query_as::<_, BankAccount>(&format!(
            "SELECT {BANK_COLUMNS} FROM bank_accounts WHERE user_id = $1 AND is_default"
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn changed_since(
        pool: &DbPool,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> sqlx::Result<Vec<BankAccount>> {
        sqlx::query_as::<_, BankAccount>(&format!(
            "SELECT {BANK_COLUMNS} FROM bank_accounts \
             WHERE user_id = $1 AND ($2::TIMESTAMPTZ IS NULL OR updated_at >= $2) ORDER BY updated_at"
        ))
        .bind(user_id)
        .bind(since)
        .fetch_all(pool)
        .await
    }

    /// Insert a bank account. The user's first account is always the default.
    pub async fn create(
        pool: &DbPool,
        user_id: Uuid,
        req: &CreateBankAccountRequest,
        account_last4: &str,
    ) -> sqlx::Result<BankAccount> {
        let mut tx = begin_locked(pool, user_id).await?;
        let make_default = req.is_default || !has_rows(&mut tx, "bank_accounts", user_id).await?;

        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO bank_accounts (id, user_id, bank_name, account_holder, account_last4, routing_number) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(user_id)
        .bind(req.bank_name.trim())
        .bind(req.account_holder.trim())
        .bind(account_last4)
        .bind(req.routing_number.as_deref())
        .execute(&mut *tx)
        .await?;

        if make_default {
            switch_default(&mut tx, "bank_accounts", user_id, id).await?;
        }

        let account = sqlx::query_as::<_, BankAccount>(&format!(
            "SELECT {BANK_COLUMNS} FROM bank_accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(account)
    }

    pub async fn update(
        pool: &DbPool,
        user_id: Uuid,
        id: Uuid,
        req: &UpdateBankAccountRequest,
    ) -> sqlx::Result<Option<BankAccount>> {
        let mut tx = begin_locked(pool, user_id).await?;

        let updated = sqlx::query(
            "UPDATE bank_accounts SET \
                bank_name = COALESCE($3, bank_name), \
                account_holder = COALESCE($4, account_holder), \
                routing_number = COALESCE($5, routing_number), \
                updated_at = NOW() \
             WHERE user_id = $1 AND id = $2",
        )
        .bind(user_id)
        .bind(id)
        .bind(req.bank_name.as_deref().map(str::trim))
        .bind(req.account_holder.as_deref().map(str::trim))
        .bind(req.routing_number.as_deref())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        match req.is_default {
            Some(true) => switch_default(&mut tx, "bank_accounts", user_id, id).await?,
            Some(false) => {
                sqlx::query("UPDATE bank_accounts SET is_default = FALSE WHERE user_id = $1 AND id = $2")
                    .bind(user_id)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
            None => {}
        }

        let account = sqlx::query_as::<_, BankAccount>(&format!(
            "SELECT {BANK_COLUMNS} FROM bank_accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(account))
    }

    pub async fn set_default(
        pool: &DbPool,
        user_id: Uuid,
        id: Uuid,
    ) -> sqlx::Result<Option<BankAccount>> {
        let mut tx = begin_locked(pool, user_id).await?;

        let owned = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM bank_accounts WHERE user_id = $1 AND id = $2)",
        )
        .bind(user_id)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if !owned {
            return Ok(None);
        }

        switch_default(&mut tx, "bank_accounts", user_id, id).await?;

        let account = sqlx::query_as::<_, BankAccount>(&format!(
            "SELECT {BANK_COLUMNS} FROM bank_accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(account))
    }

    pub async fn delete(pool: &DbPool, user_id: Uuid, id: Uuid) -> sqlx::Result<bool> {
        let mut tx = begin_locked(pool, user_id).await?;

        let deleted = sqlx::query("DELETE FROM bank_accounts WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if deleted {
            promote_latest(&mut tx, "bank_accounts", user_id).await?;
        }

        tx.commit().await?;
        Ok(deleted)
    }
}

pub struct PaymentMethodRepo;

impl PaymentMethodRepo {
    pub async fn list(pool: &DbPool, user_id: Uuid) -> sqlx::Result<Vec<PaymentMethod>> {
        sqlx::query_as::<_, PaymentMethod>(&format!(
            "SELECT {METHOD_COLUMNS} FROM payment_methods WHERE user_id = $1 \
             ORDER BY is_default DESC, created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find(pool: &DbPool, user_id: Uuid, id: Uuid) -> sqlx::Result<Option<PaymentMethod>> {
        sqlx::query_as::<_, PaymentMethod>(&format!(
            "SELECT {METHOD_COLUMNS} FROM payment_methods WHERE user_id = $1 AND id = $2"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_default(pool: &DbPool, user_id: Uuid) -> sqlx::Result<Option<PaymentMethod>> {
        sqlx::query_as::<_, PaymentMethod>(&format!(
            "SELECT {METHOD_COLUMNS} FROM payment_methods WHERE user_id = $1 AND is_default"
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn changed_since(
        pool: &DbPool,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> sqlx::Result<Vec<PaymentMethod>> {
        sqlx::query_as::<_, PaymentMethod>(&format!(
            "SELECT {METHOD_COLUMNS} FROM payment_methods \
             WHERE user_id = $1 AND ($2::TIMESTAMPTZ IS NULL OR updated_at >= $2) ORDER BY updated_at"
        ))
        .bind(user_id)
        .bind(since)
        .fetch_all(pool)
        .await
    }

    /// Insert a payment method. The user's first method is always the default.
    pub async fn create(
        pool: &DbPool,
        user_id: Uuid,
        req: &CreatePaymentMethodRequest,
    ) -> sqlx::Result<PaymentMethod> {
        let mut tx = begin_locked(pool, user_id).await?;
        let make_default =
            req.is_default || !has_rows(&mut tx, "payment_methods", user_id).await?;

        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO payment_methods (id, user_id, kind, provider, last4, expiry_month, expiry_year) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(id)
        .bind(user_id)
        .bind(req.kind)
        .bind(req.provider.trim())
        .bind(&req.last4)
        .bind(req.expiry_month)
        .bind(req.expiry_year)
        .execute(&mut *tx)
        .await?;

        if make_default {
            switch_default(&mut tx, "payment_methods", user_id, id).await?;
        }

        let method = sqlx::query_as::<_, PaymentMethod>(&format!(
            "SELECT {METHOD_COLUMNS} FROM payment_methods WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(method)
    }

    pub async fn update(
        pool: &DbPool,
        user_id: Uuid,
        id: Uuid,
        req: &UpdatePaymentMethodRequest,
    ) -> sqlx::Result<Option<PaymentMethod>> {
        let mut tx = begin_locked(pool, user_id).await?;

        let updated = sqlx::query(
            "UPDATE payment_methods SET \
                provider = COALESCE($3, provider), \
                expiry_month = COALESCE($4, expiry_month), \
                expiry_year = COALESCE($5, expiry_year), \
                updated_at = NOW() \
             WHERE user_id = $1 AND id = $2",
        )
        .bind(user_id)
        .bind(id)
        .bind(req.provider.as_deref().map(str::trim))
        .bind(req.expiry_month)
        .bind(req.expiry_year)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        match req.is_default {
            Some(true) => switch_default(&mut tx, "payment_methods", user_id, id).await?,
            Some(false) => {
                sqlx::query("UPDATE payment_methods SET is_default = FALSE WHERE user_id = $1 AND id = $2")
                    .bind(user_id)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
            None => {}
        }

        let method = sqlx::query_as::<_, PaymentMethod>(&format!(
            "SELECT {METHOD_COLUMNS} FROM payment_methods WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(method))
    }

    pub async fn set_default(
        pool: &DbPool,
        user_id: Uuid,
        id: Uuid,
    ) -> sqlx::Result<Option<PaymentMethod>> {
        let mut tx = begin_locked(pool, user_id).await?;

        let owned = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM payment_methods WHERE user_id = $1 AND id = $2)",
        )
        .bind(user_id)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if !owned {
            return Ok(None);
        }

        switch_default(&mut tx, "payment_methods", user_id, id).await?;

        let method = sqlx::query_as::<_, PaymentMethod>(&format!(
            "SELECT {METHOD_COLUMNS} FROM payment_methods WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(method))
    }

    pub async fn delete(pool: &DbPool, user_id: Uuid, id: Uuid) -> sqlx::Result<bool> {
        let mut tx = begin_locked(pool, user_id).await?;

        let deleted = sqlx::query("DELETE FROM payment_methods WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if deleted {
            promote_latest(&mut tx, "payment_methods", user_id).await?;
        }

        tx.commit().await?;
        Ok(deleted)
    }
}
