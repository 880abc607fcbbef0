// Subscription plan and subscription queries

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgExecutor;
use uuid::Uuid;

use super::DbPool;
use crate::models::{CreatePlanRequest, Subscription, SubscriptionPlan, SubscriptionStatus};

const PLAN_COLUMNS: &str = "id, name, price, interval_days, features, is_active, created_at";

const SUB_COLUMNS: &str = "id, user_id, plan_id, payment_method_id, previous_subscription_id, \
     status, auto_renew, start_date, end_date, cancelled_at, created_at, updated_at";

/// Fields for a new billing period
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub payment_method_id: Option<Uuid>,
    pub previous_subscription_id: Option<Uuid>,
    pub auto_renew: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

pub struct SubscriptionRepo;

impl SubscriptionRepo {
    pub async fn active_plans(pool: &DbPool) -> sqlx::Result<Vec<SubscriptionPlan>> {
        sqlx::query_as::<_, SubscriptionPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM subscription_plans WHERE is_active ORDER BY price"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find_plan(pool: &DbPool, id: Uuid) -> sqlx::Result<Option<SubscriptionPlan>> {
        sqlx::query_as::<_, SubscriptionPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM subscription_plans WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create_plan(pool: &DbPool, req: &CreatePlanRequest) -> sqlx::Result<SubscriptionPlan> {
        sqlx::query_as::<_, SubscriptionPlan>(&format!(
            "INSERT INTO subscription_plans (id, name, price, interval_days, features) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {PLAN_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(req.name.trim())
        .bind(req.price)
        .bind(req.interval_days)
        .bind(Json(&req.features))
        .fetch_one(pool)
        .await
    }

    pub async fn find_active<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
    ) -> sqlx::Result<Option<Subscription>> {
        sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions WHERE user_id = $1 AND status = 'ACTIVE' \
             ORDER BY end_date DESC LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find(pool: &DbPool, user_id: Uuid, id: Uuid) -> sqlx::Result<Option<Subscription>> {
        sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions WHERE user_id = $1 AND id = $2"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &DbPool,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> sqlx::Result<(Vec<Subscription>, i64)> {
        let subscriptions = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions WHERE user_id = $1 \
             ORDER BY start_date DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM subscriptions WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(pool)
                .await?;

        Ok((subscriptions, total))
    }

    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        new: &NewSubscription,
    ) -> sqlx::Result<Subscription> {
        sqlx::query_as::<_, Subscription>(&format!(
            "INSERT INTO subscriptions (id, user_id, plan_id, payment_method_id, \
                previous_subscription_id, status, auto_renew, start_date, end_date) \
             VALUES ($1, $2, $3, $4, $5, 'ACTIVE', $6, $7, $8) RETURNING {SUB_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.plan_id)
        .bind(new.payment_method_id)
        .bind(new.previous_subscription_id)
        .bind(new.auto_renew)
        .bind(new.start_date)
        .bind(new.end_date)
        .fetch_one(executor)
        .await
    }

    /// Move an ACTIVE subscription to `status`. Returns `None` if it was no
    /// longer ACTIVE, so concurrent jobs never process the same period twice.
    pub async fn close<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        status: SubscriptionStatus,
    ) -> sqlx::Result<Option<Subscription>> {
        sqlx::query_as::<_, Subscription>(&format!(
            "UPDATE subscriptions SET status = $2, \
                auto_renew = CASE WHEN $2 = 'CANCELLED' THEN FALSE ELSE auto_renew END, \
                cancelled_at = CASE WHEN $2 = 'CANCELLED' THEN NOW() ELSE cancelled_at END, \
                updated_at = NOW() \
             WHERE id = $1 AND status = 'ACTIVE' RETURNING {SUB_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(executor)
        .await
    }

    pub async fn set_auto_renew(
        pool: &DbPool,
        user_id: Uuid,
        id: Uuid,
        auto_renew: bool,
    ) -> sqlx::Result<Option<Subscription>> {
        sqlx::query_as::<_, Subscription>(&format!(
            "UPDATE subscriptions SET auto_renew = $3, updated_at = NOW() \
             WHERE user_id = $1 AND id = $2 AND status = 'ACTIVE' RETURNING {SUB_COLUMNS}"
        ))
        .bind(user_id)
        .bind(id)
        .bind(auto_renew)
        .fetch_optional(pool)
        .await
    }

    /// Lock a subscription that is still ACTIVE and due. `None` when someone
    /// else already closed it or the period was extended.
    pub async fn claim_due<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> sqlx::Result<Option<Subscription>> {
        sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions \
             WHERE id = $1 AND status = 'ACTIVE' AND end_date <= $2 FOR UPDATE"
        ))
        .bind(id)
        .bind(now)
        .fetch_optional(executor)
        .await
    }

    /// ACTIVE subscriptions whose period has ended
    pub async fn due(pool: &DbPool, now: DateTime<Utc>, limit: i64) -> sqlx::Result<Vec<Subscription>> {
        sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions WHERE status = 'ACTIVE' AND end_date <= $1 \
             ORDER BY end_date LIMIT $2"
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
