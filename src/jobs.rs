// Background worker: withdrawal settlement, subscription renewal, session cleanup

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::database::{SessionRepo, TransactionRepo};
use crate::services::push::notify_user;
use crate::services::subscriptions;
use crate::AppState;

pub struct JobRunner {
    state: Arc<AppState>,
    interval: Duration,
}

impl JobRunner {
    pub fn new(state: Arc<AppState>) -> Self {
        let interval = state.config.job_interval;
        Self { state, interval }
    }

    /// Run forever. A failing step is logged and retried on the next tick.
    pub async fn run(&self) {
        info!("Starting background jobs (every {:?})", self.interval);

        loop {
            if let Err(e) = self.settle_withdrawals().await {
                error!("Withdrawal settlement failed: {:#}", e);
            }
            if let Err(e) = self.renew_subscriptions().await {
                error!("Subscription renewal failed: {:#}", e);
            }
            if let Err(e) = self.purge_sessions().await {
                error!("Session cleanup failed: {:#}", e);
            }

            tokio::time::sleep(self.interval).await;
        }
    }

    /// PENDING withdrawals older than the settlement delay become COMPLETED
    async fn settle_withdrawals(&self) -> Result<()> {
        let delay = chrono::Duration::from_std(self.state.config.withdrawal_settlement)?;
        let settled = TransactionRepo::settle_withdrawals(&self.state.db, Utc::now() - delay).await?;

        for withdrawal in &settled {
            info!(
                "Settled withdrawal {} of {} for user {}",
                withdrawal.id, withdrawal.amount, withdrawal.user_id
            );
            if let Err(e) = notify_user(
                &self.state.db,
                &self.state.push,
                withdrawal.user_id,
                "Withdrawal completed",
                &format!("Your withdrawal of {} has been sent to your bank account.", withdrawal.amount),
                "withdrawal",
            )
            .await
            {
                error!("Failed to notify user {} of settlement: {}", withdrawal.user_id, e);
            }
        }
        Ok(())
    }

    async fn renew_subscriptions(&self) -> Result<()> {
        let summary = subscriptions::process_due(
            &self.state.db,
            &self.state.gateway,
            &self.state.push,
            Utc::now(),
        )
        .await?;

        if summary != subscriptions::RenewalSummary::default() {
            info!(
                "Subscriptions: {} renewed, {} payment failed, {} expired",
                summary.renewed, summary.failed, summary.expired
            );
        }
        Ok(())
    }

    async fn purge_sessions(&self) -> Result<()> {
        let purged = SessionRepo::purge_expired(&self.state.db).await?;
        if purged > 0 {
            info!("Purged {} expired session(s)", purged);
        }
        Ok(())
    }
}
