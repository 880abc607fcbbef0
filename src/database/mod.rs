// Database layer for the funding backend

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use std::time::Duration;
use tracing::info;

pub mod accounts;
pub mod advice;
pub mod analytics;
pub mod fundings;
pub mod notifications;
pub mod platforms;
pub mod subscriptions;
pub mod transactions;
pub mod users;

pub use accounts::{BankAccountRepo, PaymentMethodRepo};
pub use advice::AdviceRepo;
pub use analytics::{AnalyticsRepo, FundingPerformance, StatusCount, TypeVolume, UserCounts};
pub use fundings::FundingRepo;
pub use notifications::NotificationRepo;
pub use platforms::PlatformRepo;
pub use subscriptions::{NewSubscription, SubscriptionRepo};
pub use transactions::TransactionRepo;
pub use users::{SessionRepo, UserRepo};

pub type DbPool = Pool<Postgres>;

pub struct Database;

impl Database {
    /// Initialize database connection pool
    pub async fn init(database_url: &str, max_connections: u32) -> Result<DbPool> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;

        // Run migrations
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("Database initialized successfully");
        Ok(pool)
    }

    pub async fn ping(pool: &DbPool) -> bool {
        sqlx::query("SELECT 1").execute(pool).await.is_ok()
    }

    /// Sync cursor on the database clock. Rows stamp `updated_at = NOW()`,
    /// which is their transaction's start, so the cursor is held back to the
    /// start of the oldest transaction still open; anything it has written
    /// is not visible yet and must be picked up by the next pull.
    pub async fn sync_cursor(pool: &DbPool) -> sqlx::Result<DateTime<Utc>> {
        sqlx::query_scalar(
            "SELECT LEAST(NOW(), COALESCE(MIN(xact_start), NOW())) \
             FROM pg_stat_activity \
             WHERE datname = current_database() AND xact_start IS NOT NULL",
        )
        .fetch_one(pool)
        .await
    }
}

/// True when `err` is a Postgres unique-constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}
