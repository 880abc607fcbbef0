// Notification and device token queries

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DbPool;
use crate::models::{DevicePlatform, DeviceToken, Notification};

const NOTIFICATION_COLUMNS: &str = "id, user_id, title, body, kind, is_read, created_at, updated_at";

pub struct NotificationRepo;

impl NotificationRepo {
    pub async fn insert(
        pool: &DbPool,
        user_id: Uuid,
        title: &str,
        body: &str,
        kind: &str,
    ) -> sqlx::Result<Notification> {
        sqlx::query_as::<_, Notification>(&format!(
            "INSERT INTO notifications (id, user_id, title, body, kind) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(title)
        .bind(body)
        .bind(kind)
        .fetch_one(pool)
        .await
    }

    /// One notification row per user, in a single statement
    pub async fn insert_for_all(
        pool: &DbPool,
        title: &str,
        body: &str,
        kind: &str,
    ) -> sqlx::Result<u64> {
        let result = sqlx::query(
            "INSERT INTO notifications (id, user_id, title, body, kind) \
             SELECT gen_random_uuid(), id, $1, $2, $3 FROM users",
        )
        .bind(title)
        .bind(body)
        .bind(kind)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn list(
        pool: &DbPool,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> sqlx::Result<(Vec<Notification>, i64)> {
        let notifications = sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE user_id = $1 AND (NOT $2 OR NOT is_read) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND (NOT $2 OR NOT is_read)",
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_one(pool)
        .await?;

        Ok((notifications, total))
    }

    pub async fn unread_count(pool: &DbPool, user_id: Uuid) -> sqlx::Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    pub async fn mark_read(
        pool: &DbPool,
        user_id: Uuid,
        id: Uuid,
    ) -> sqlx::Result<Option<Notification>> {
        sqlx::query_as::<_, Notification>(&format!(
            "UPDATE notifications SET is_read = TRUE, updated_at = NOW() \
             WHERE user_id = $1 AND id = $2 RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn mark_all_read(pool: &DbPool, user_id: Uuid) -> sqlx::Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE, updated_at = NOW() WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(pool: &DbPool, user_id: Uuid, id: Uuid) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn changed_since(
        pool: &DbPool,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> sqlx::Result<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE user_id = $1 AND ($2::TIMESTAMPTZ IS NULL OR updated_at >= $2) \
             ORDER BY updated_at"
        ))
        .bind(user_id)
        .bind(since)
        .fetch_all(pool)
        .await
    }

    /// Register a device token, moving it to `user_id` if another user had it
    pub async fn upsert_device(
        pool: &DbPool,
        user_id: Uuid,
        token: &str,
        platform: DevicePlatform,
    ) -> sqlx::Result<DeviceToken> {
        sqlx::query_as::<_, DeviceToken>(
            "INSERT INTO device_tokens (token, user_id, platform) VALUES ($1, $2, $3) \
             ON CONFLICT (token) DO UPDATE SET user_id = EXCLUDED.user_id, \
                platform = EXCLUDED.platform, updated_at = NOW() \
             RETURNING token, user_id, platform, created_at, updated_at",
        )
        .bind(token)
        .bind(user_id)
        .bind(platform)
        .fetch_one(pool)
        .await
    }

    pub async fn delete_device(pool: &DbPool, user_id: Uuid, token: &str) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM device_tokens WHERE user_id = $1 AND token = $2")
            .bind(user_id)
            .bind(token)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn device_tokens(pool: &DbPool, user_id: Uuid) -> sqlx::Result<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT token FROM device_tokens WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    pub async fn all_device_tokens(pool: &DbPool) -> sqlx::Result<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT token FROM device_tokens")
            .fetch_all(pool)
            .await
    }

    pub async fn prune_devices(pool: &DbPool, tokens: &[String]) -> sqlx::Result<u64> {
        if tokens.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM device_tokens WHERE token = ANY($1)")
            .bind(tokens)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
