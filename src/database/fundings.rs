// Funding queries

use sqlx::PgExecutor;
use uuid::Uuid;

use super::DbPool;
use crate::models::{Funding, FundingStatus};

const FUNDING_COLUMNS: &str =
    "id, user_id, platform_id, amount, profit_share, status, created_at, updated_at";

pub struct FundingRepo;

impl FundingRepo {
    pub async fn list(
        pool: &DbPool,
        user_id: Uuid,
        status: Option<FundingStatus>,
        platform_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> sqlx::Result<(Vec<Funding>, i64)> {
        let fundings = sqlx::query_as::<_, Funding>(&format!(
            "SELECT {FUNDING_COLUMNS} FROM fundings \
             WHERE user_id = $1 \
               AND ($2::funding_status IS NULL OR status = $2) \
               AND ($3::UUID IS NULL OR platform_id = $3) \
             ORDER BY created_at DESC LIMIT $4 OFFSET $5"
        ))
        .bind(user_id)
        .bind(status)
        .bind(platform_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM fundings \
             WHERE user_id = $1 \
               AND ($2::funding_status IS NULL OR status = $2) \
               AND ($3::UUID IS NULL OR platform_id = $3)",
        )
        .bind(user_id)
        .bind(status)
        .bind(platform_id)
        .fetch_one(pool)
        .await?;

        Ok((fundings, total))
    }

    pub async fn all_for_user(pool: &DbPool, user_id: Uuid) -> sqlx::Result<Vec<Funding>> {
        sqlx::query_as::<_, Funding>(&format!(
            "SELECT {FUNDING_COLUMNS} FROM fundings WHERE user_id = $1 ORDER BY created_at"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Owner-scoped lookup
    pub async fn find<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
        id: Uuid,
    ) -> sqlx::Result<Option<Funding>> {
        sqlx::query_as::<_, Funding>(&format!(
            "SELECT {FUNDING_COLUMNS} FROM fundings WHERE user_id = $1 AND id = $2"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_by_id(pool: &DbPool, id: Uuid) -> sqlx::Result<Option<Funding>> {
        sqlx::query_as::<_, Funding>(&format!("SELECT {FUNDING_COLUMNS} FROM fundings WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Whether the user has an ACTIVE funding on the platform, ignoring `except`
    pub async fn has_active<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
        platform_id: Uuid,
        except: Option<Uuid>,
    ) -> sqlx::Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM fundings \
             WHERE user_id = $1 AND platform_id = $2 AND status = 'ACTIVE' \
               AND ($3::UUID IS NULL OR id <> $3))",
        )
        .bind(user_id)
        .bind(platform_id)
        .bind(except)
        .fetch_one(executor)
        .await
    }

    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
        platform_id: Uuid,
        amount: i64,
        profit_share: i32,
    ) -> sqlx::Result<Funding> {
        sqlx::query_as::<_, Funding>(&format!(
            "INSERT INTO fundings (id, user_id, platform_id, amount, profit_share, status) \
             VALUES ($1, $2, $3, $4, $5, 'ACTIVE') RETURNING {FUNDING_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(platform_id)
        .bind(amount)
        .bind(profit_share)
        .fetch_one(executor)
        .await
    }

    /// Only an ACTIVE or PAUSED funding is touched; `None` otherwise.
    pub async fn update_terms<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
        id: Uuid,
        amount: Option<i64>,
        profit_share: Option<i32>,
    ) -> sqlx::Result<Option<Funding>> {
        sqlx::query_as::<_, Funding>(&format!(
            "UPDATE fundings SET \
                amount = COALESCE($3, amount), \
                profit_share = COALESCE($4, profit_share), \
                updated_at = NOW() \
             WHERE user_id = $1 AND id = $2 AND status IN ('ACTIVE', 'PAUSED') \
             RETURNING {FUNDING_COLUMNS}"
        ))
        .bind(user_id)
        .bind(id)
        .bind(amount)
        .bind(profit_share)
        .fetch_optional(executor)
        .await
    }

    pub async fn set_status<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        status: FundingStatus,
    ) -> sqlx::Result<Funding> {
        sqlx::query_as::<_, Funding>(&format!(
            "UPDATE fundings SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {FUNDING_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_one(executor)
        .await
    }

    pub async fn changed_since(
        pool: &DbPool,
        user_id: Uuid,
        since: Option<chrono::DateTime<chrono::Utc>>,
    ) -> sqlx::Result<Vec<Funding>> {
        sqlx::query_as::<_, Funding>(&format!(
            "SELECT {FUNDING_COLUMNS} FROM fundings \
             WHERE user_id = $1 AND ($2::TIMESTAMPTZ IS NULL OR updated_at >= $2) \
             ORDER BY updated_at"
        ))
        .bind(user_id)
        .bind(since)
        .fetch_all(pool)
        .await
    }
}
