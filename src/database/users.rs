// User and session queries

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::DbPool;
use crate::models::{Session, User, UserRole};

const USER_COLUMNS: &str = "id, email, password_hash, full_name, phone, role, is_verified, \
     verification_code_hash, verification_expires_at, verification_attempts, created_at, updated_at";

pub struct UserRepo;

impl UserRepo {
    pub async fn create(
        pool: &DbPool,
        email: &str,
        password_hash: &str,
        full_name: &str,
    ) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, email, password_hash, full_name) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .bind(full_name)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_email(pool: &DbPool, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    /// Row-lock the user for the rest of the surrounding transaction.
    /// Serializes balance-affecting operations per user.
    pub async fn lock<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> sqlx::Result<bool> {
        let row = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row.is_some())
    }

    pub async fn update_profile(
        pool: &DbPool,
        id: Uuid,
        full_name: Option<&str>,
        phone: Option<&str>,
    ) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET \
                full_name = COALESCE($2, full_name), \
                phone = COALESCE($3, phone), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(full_name)
        .bind(phone)
        .fetch_one(pool)
        .await
    }

    pub async fn update_password(pool: &DbPool, id: Uuid, password_hash: &str) -> sqlx::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_verification_code(
        pool: &DbPool,
        id: Uuid,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> sqlx::Result<()> {
        sqlx::query(
            "UPDATE users SET verification_code_hash = $2, verification_expires_at = $3, \
             verification_attempts = 0, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(code_hash)
        .bind(expires_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn mark_verified<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET is_verified = TRUE, verification_code_hash = NULL, \
             verification_expires_at = NULL, verification_attempts = 0, updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(executor)
        .await
    }

    /// Count a wrong code. The code is discarded once `max_attempts` is
    /// reached. Returns the new attempt count.
    pub async fn record_failed_verification<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        max_attempts: i32,
    ) -> sqlx::Result<i32> {
        sqlx::query_scalar::<_, i32>(
            "UPDATE users SET verification_attempts = verification_attempts + 1, \
                verification_code_hash = CASE WHEN verification_attempts + 1 >= $2 \
                    THEN NULL ELSE verification_code_hash END, \
                verification_expires_at = CASE WHEN verification_attempts + 1 >= $2 \
                    THEN NULL ELSE verification_expires_at END, \
                updated_at = NOW() \
             WHERE id = $1 RETURNING verification_attempts",
        )
        .bind(id)
        .bind(max_attempts)
        .fetch_one(executor)
        .await
    }

    pub async fn update_role(pool: &DbPool, id: Uuid, role: UserRole) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &DbPool, id: Uuid) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list(
        pool: &DbPool,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> sqlx::Result<(Vec<User>, i64)> {
        let pattern = search.map(|s| format!("%{}%", s.trim()));

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE $1::TEXT IS NULL OR email ILIKE $1 OR full_name ILIKE $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(pattern.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE $1::TEXT IS NULL OR email ILIKE $1 OR full_name ILIKE $1",
        )
        .bind(pattern.as_deref())
        .fetch_one(pool)
        .await?;

        Ok((users, total))
    }

    pub async fn all_ids(pool: &DbPool) -> sqlx::Result<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM users")
            .fetch_all(pool)
            .await
    }
}

pub struct SessionRepo;

impl SessionRepo {
    pub async fn create(
        pool: &DbPool,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> sqlx::Result<Session> {
        sqlx::query_as::<_, Session>(
            "INSERT INTO sessions (id, user_id, token_hash, expires_at) VALUES ($1, $2, $3, $4) \
             RETURNING id, user_id, token_hash, expires_at, revoked, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(pool)
        .await
    }

    /// Live (unrevoked, unexpired) session for a token digest, with its user
    pub async fn find_active(
        pool: &DbPool,
        token_hash: &str,
    ) -> sqlx::Result<Option<(Session, User)>> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT id, user_id, token_hash, expires_at, revoked, created_at FROM sessions \
             WHERE token_hash = $1 AND NOT revoked AND expires_at > NOW()",
        )
        .bind(token_hash)
        .fetch_optional(pool)
        .await?;

        let Some(session) = session else {
            return Ok(None);
        };

        let user = UserRepo::find_by_id(pool, session.user_id).await?;
        Ok(user.map(|user| (session, user)))
    }

    pub async fn revoke(pool: &DbPool, id: Uuid) -> sqlx::Result<()> {
        sqlx::query("UPDATE sessions SET revoked = TRUE WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn revoke_others(pool: &DbPool, user_id: Uuid, keep: Uuid) -> sqlx::Result<u64> {
        let result =
            sqlx::query("UPDATE sessions SET revoked = TRUE WHERE user_id = $1 AND id <> $2 AND NOT revoked")
                .bind(user_id)
                .bind(keep)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }

    pub async fn purge_expired(pool: &DbPool) -> sqlx::Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW() OR revoked")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
