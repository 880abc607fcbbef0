// Advice history queries

use uuid::Uuid;

use super::DbPool;
use crate::models::{Advice, AdviceSource};

pub struct AdviceRepo;

impl AdviceRepo {
    pub async fn insert(
        pool: &DbPool,
        user_id: Uuid,
        question: &str,
        answer: &str,
        source: AdviceSource,
    ) -> sqlx::Result<Advice> {
        sqlx::query_as::<_, Advice>(
            "INSERT INTO advice (id, user_id, question, answer, source) VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, user_id, question, answer, source, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(question)
        .bind(answer)
        .bind(source)
        .fetch_one(pool)
        .await
    }

    pub async fn list(
        pool: &DbPool,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> sqlx::Result<(Vec<Advice>, i64)> {
        let items = sqlx::query_as::<_, Advice>(
            "SELECT id, user_id, question, answer, source, created_at FROM advice \
             WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM advice WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

        Ok((items, total))
    }
}
