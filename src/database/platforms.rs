// Platform and platform connection queries

use uuid::Uuid;

use super::DbPool;
use crate::models::{
    ConnectionStatus, CreatePlatformRequest, Platform, PlatformCategory, PlatformConnection,
    UpdatePlatformRequest,
};

const PLATFORM_COLUMNS: &str = "id, name, category, description, website_url, min_investment, \
     expected_return_pct, is_active, created_at, updated_at";

const CONNECTION_COLUMNS: &str =
    "id, user_id, platform_id, external_account_id, status, connected_at, updated_at";

pub struct PlatformRepo;

impl PlatformRepo {
    pub async fn list_active(
        pool: &DbPool,
        category: Option<PlatformCategory>,
        limit: i64,
        offset: i64,
    ) -> sqlx::Result<(Vec<Platform>, i64)> {
        let platforms = sqlx::query_as::<_, Platform>(&format!(
            "SELECT {PLATFORM_COLUMNS} FROM platforms \
             WHERE is_active AND ($1::platform_category IS NULL OR category = $1) \
             ORDER BY name LIMIT $2 OFFSET $3"
        ))
        .bind(category)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM platforms \
             WHERE is_active AND ($1::platform_category IS NULL OR category = $1)",
        )
        .bind(category)
        .fetch_one(pool)
        .await?;

        Ok((platforms, total))
    }

    pub async fn find(pool: &DbPool, id: Uuid) -> sqlx::Result<Option<Platform>> {
        sqlx::query_as::<_, Platform>(&format!(
            "SELECT {PLATFORM_COLUMNS} FROM platforms WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(pool: &DbPool, req: &CreatePlatformRequest) -> sqlx::Result<Platform> {
        sqlx::query_as::<_, Platform>(&format!(
            "INSERT INTO platforms (id, name, category, description, website_url, min_investment, expected_return_pct) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {PLATFORM_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(req.name.trim())
        .bind(req.category)
        .bind(req.description.as_deref())
        .bind(req.website_url.as_deref())
        .bind(req.min_investment)
        .bind(req.expected_return_pct)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &DbPool,
        id: Uuid,
        req: &UpdatePlatformRequest,
    ) -> sqlx::Result<Option<Platform>> {
        sqlx::query_as::<_, Platform>(&format!(
            "UPDATE platforms SET \
                name = COALESCE($2, name), \
                category = COALESCE($3, category), \
                description = COALESCE($4, description), \
                website_url = COALESCE($5, website_url), \
                min_investment = COALESCE($6, min_investment), \
                expected_return_pct = COALESCE($7, expected_return_pct), \
                is_active = COALESCE($8, is_active), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {PLATFORM_COLUMNS}"
        ))
        .bind(id)
        .bind(req.name.as_deref().map(str::trim))
        .bind(req.category)
        .bind(req.description.as_deref())
        .bind(req.website_url.as_deref())
        .bind(req.min_investment)
        .bind(req.expected_return_pct)
        .bind(req.is_active)
        .fetch_optional(pool)
        .await
    }

    /// Delete a platform, or deactivate it when fundings still reference it.
    /// Returns `None` when the platform does not exist, `Some(true)` when the
    /// row was removed and `Some(false)` when it was only deactivated.
    pub async fn delete_or_deactivate(pool: &DbPool, id: Uuid) -> sqlx::Result<Option<bool>> {
        let mut tx = pool.begin().await?;

        let referenced = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM fundings WHERE platform_id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        let affected = if referenced {
            sqlx::query("UPDATE platforms SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected()
        } else {
            sqlx::query("DELETE FROM platforms WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected()
        };

        tx.commit().await?;
        Ok((affected > 0).then_some(!referenced))
    }

    pub async fn connections(pool: &DbPool, user_id: Uuid) -> sqlx::Result<Vec<PlatformConnection>> {
        sqlx::query_as::<_, PlatformConnection>(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM platform_connections WHERE user_id = $1 \
             ORDER BY connected_at DESC"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn connect(
        pool: &DbPool,
        user_id: Uuid,
        platform_id: Uuid,
        external_account_id: &str,
    ) -> sqlx::Result<PlatformConnection> {
        sqlx::query_as::<_, PlatformConnection>(&format!(
            "INSERT INTO platform_connections (id, user_id, platform_id, external_account_id, status) \
             VALUES ($1, $2, $3, $4, 'CONNECTED') \
             ON CONFLICT (user_id, platform_id) DO UPDATE SET \
                external_account_id = EXCLUDED.external_account_id, \
                status = 'CONNECTED', connected_at = NOW(), updated_at = NOW() \
             RETURNING {CONNECTION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(platform_id)
        .bind(external_account_id)
        .fetch_one(pool)
        .await
    }

    pub async fn disconnect(
        pool: &DbPool,
        user_id: Uuid,
        platform_id: Uuid,
    ) -> sqlx::Result<Option<PlatformConnection>> {
        sqlx::query_as::<_, PlatformConnection>(&format!(
            "UPDATE platform_connections SET status = $3, updated_at = NOW() \
             WHERE user_id = $1 AND platform_id = $2 RETURNING {CONNECTION_COLUMNS}"
        ))
        .bind(user_id)
        .bind(platform_id)
        .bind(ConnectionStatus::Disconnected)
        .fetch_optional(pool)
        .await
    }
}
