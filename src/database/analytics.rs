// Report source queries. Shaping happens in services::analytics.

use sqlx::FromRow;
use uuid::Uuid;

use super::DbPool;
use crate::models::{FundingStatus, TransactionType};

/// One funding with its platform and realized profit
#[derive(Debug, Clone, FromRow)]
pub struct FundingPerformance {
    pub funding_id: Uuid,
    pub platform_id: Uuid,
    pub platform_name: String,
    pub amount: i64,
    pub status: FundingStatus,
    pub profit: i64,
}

#[derive(Debug, Clone, Copy, FromRow)]
pub struct StatusCount {
    pub status: FundingStatus,
    pub count: i64,
}

#[derive(Debug, Clone, Copy, FromRow)]
pub struct TypeVolume {
    pub tx_type: TransactionType,
    pub count: i64,
    pub volume: i64,
}

#[derive(Debug, Clone, Copy, FromRow)]
pub struct UserCounts {
    pub total: i64,
    pub verified: i64,
}

pub struct AnalyticsRepo;

impl AnalyticsRepo {
    pub async fn funding_performance(
        pool: &DbPool,
        user_id: Uuid,
    ) -> sqlx::Result<Vec<FundingPerformance>> {
        sqlx::query_as::<_, FundingPerformance>(
            "SELECT f.id AS funding_id, f.platform_id, p.name AS platform_name, f.amount, f.status, \
                COALESCE((SELECT SUM(t.amount) FROM transactions t \
                          WHERE t.funding_id = f.id AND t.tx_type = 'PROFIT' \
                            AND t.status = 'COMPLETED'), 0)::BIGINT AS profit \
             FROM fundings f JOIN platforms p ON p.id = f.platform_id \
             WHERE f.user_id = $1 ORDER BY f.created_at",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn user_counts(pool: &DbPool) -> sqlx::Result<UserCounts> {
        sqlx::query_as::<_, UserCounts>(
            "SELECT COUNT(*) AS total, COUNT(*) FILTER (WHERE is_verified) AS verified FROM users",
        )
        .fetch_one(pool)
        .await
    }

    pub async fn fundings_by_status(pool: &DbPool) -> sqlx::Result<Vec<StatusCount>> {
        sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM fundings GROUP BY status",
        )
        .fetch_all(pool)
        .await
    }

    pub async fn completed_volume_by_type(pool: &DbPool) -> sqlx::Result<Vec<TypeVolume>> {
        sqlx::query_as::<_, TypeVolume>(
            "SELECT tx_type, COUNT(*) AS count, COALESCE(SUM(amount), 0)::BIGINT AS volume \
             FROM transactions WHERE status = 'COMPLETED' GROUP BY tx_type",
        )
        .fetch_all(pool)
        .await
    }

    pub async fn active_subscriptions(pool: &DbPool) -> sqlx::Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM subscriptions WHERE status = 'ACTIVE'")
            .fetch_one(pool)
            .await
    }
}
