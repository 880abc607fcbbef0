// Subscription purchase and the renewal batch

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::payments::{ChargeReceipt, PaymentError, PaymentGateway};
use super::push::{notify_user, PushClient};
use crate::database::{
    DbPool, NewSubscription, PaymentMethodRepo, SubscriptionRepo, TransactionRepo, UserRepo,
};
use crate::error::ApiError;
use crate::models::{
    NewTransaction, PaymentMethod, SubscribeRequest, Subscription, SubscriptionPlan,
    SubscriptionStatus, TransactionStatus, TransactionType,
};

/// Most subscriptions handled per job run
const RENEWAL_BATCH_SIZE: i64 = 100;

/// What to do with a subscription whose period has ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalAction {
    Renew,
    Expire,
}

impl RenewalAction {
    pub fn for_subscription(subscription: &Subscription) -> Self {
        if subscription.auto_renew {
            RenewalAction::Renew
        } else {
            RenewalAction::Expire
        }
    }
}

/// The period following one that ends at `previous_end`
pub fn next_period(previous_end: DateTime<Utc>, interval_days: i32) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        previous_end,
        previous_end + Duration::days(i64::from(interval_days)),
    )
}

fn subscription_charge(
    subscription_user: Uuid,
    plan: &SubscriptionPlan,
    method: Option<&PaymentMethod>,
    outcome: &Result<ChargeReceipt, PaymentError>,
) -> NewTransaction {
    let status = match outcome {
        Ok(_) => TransactionStatus::Completed,
        Err(_) => TransactionStatus::Failed,
    };
    let mut entry = NewTransaction::new(
        subscription_user,
        TransactionType::Subscription,
        status,
        plan.price,
    );
    entry.payment_method_id = method.map(|m| m.id);
    entry.description = Some(match outcome {
        Ok(_) => format!("{} subscription", plan.name),
        Err(e) => format!("{} subscription: {}", plan.name, e),
    });
    if let Ok(receipt) = outcome {
        entry.reference = Some(receipt.reference.clone());
    }
    entry
}

/// Charge for `req.plan_id` and open the first period. A declined charge is
/// still recorded as a FAILED transaction before the error is returned.
pub async fn subscribe(
    pool: &DbPool,
    gateway: &PaymentGateway,
    user_id: Uuid,
    req: &SubscribeRequest,
) -> Result<Subscription, ApiError> {
    let plan = SubscriptionRepo::find_plan(pool, req.plan_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or(ApiError::NotFound("Subscription plan"))?;

    let method = match req.payment_method_id {
        Some(id) => Some(
            PaymentMethodRepo::find(pool, user_id, id)
                .await?
                .ok_or(ApiError::NotFound("Payment method"))?,
        ),
        None => PaymentMethodRepo::find_default(pool, user_id).await?,
    };
    let method = method.ok_or_else(|| ApiError::bad_request("No payment method available"))?;

    let mut tx = pool.begin().await?;
    if !UserRepo::lock(&mut *tx, user_id).await? {
        return Err(ApiError::NotFound("User"));
    }
    if SubscriptionRepo::find_active(&mut *tx, user_id).await?.is_some() {
        return Err(ApiError::bad_request("You already have an active subscription"));
    }

    let now = Utc::now();
    let outcome = gateway.charge(Some(&method), plan.price, now);
    TransactionRepo::insert(
        &mut *tx,
        &subscription_charge(user_id, &plan, Some(&method), &outcome),
    )
    .await?;

    if let Err(e) = outcome {
        tx.commit().await?;
        return Err(e.into());
    }

    let (start_date, end_date) = next_period(now, plan.interval_days);
    let subscription = SubscriptionRepo::insert(
        &mut *tx,
        &NewSubscription {
            user_id,
            plan_id: plan.id,
            payment_method_id: Some(method.id),
            previous_subscription_id: None,
            auto_renew: true,
            start_date,
            end_date,
        },
    )
    .await?;
    tx.commit().await?;

    info!("User {} subscribed to plan {} ({})", user_id, plan.name, subscription.id);
    Ok(subscription)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenewalSummary {
    pub renewed: usize,
    pub failed: usize,
    pub expired: usize,
}

/// Renew or expire every ACTIVE subscription whose period ended by `now`
pub async fn process_due(
    pool: &DbPool,
    gateway: &PaymentGateway,
    push: &PushClient,
    now: DateTime<Utc>,
) -> anyhow::Result<RenewalSummary> {
    let due = SubscriptionRepo::due(pool, now, RENEWAL_BATCH_SIZE).await?;
    let mut summary = RenewalSummary::default();

    for subscription in due {
        match settle(pool, gateway, push, &subscription, now).await {
            Ok(Some(SubscriptionStatus::Renewed)) => summary.renewed += 1,
            Ok(Some(SubscriptionStatus::PaymentFailed)) => summary.failed += 1,
            Ok(Some(SubscriptionStatus::Expired)) => summary.expired += 1,
            Ok(_) => {}
            Err(e) => error!("Failed to process subscription {}: {:#}", subscription.id, e),
        }
    }

    Ok(summary)
}

/// Close one due period. The row is re-read under lock before anything is
/// charged, so a cancel or auto-renew change made after `due` ran wins.
async fn settle(
    pool: &DbPool,
    gateway: &PaymentGateway,
    push: &PushClient,
    listed: &Subscription,
    now: DateTime<Utc>,
) -> anyhow::Result<Option<SubscriptionStatus>> {
    let mut tx = pool.begin().await?;
    UserRepo::lock(&mut *tx, listed.user_id).await?;
    let Some(subscription) = SubscriptionRepo::claim_due(&mut *tx, listed.id, now).await? else {
        return Ok(None);
    };

    if RenewalAction::for_subscription(&subscription) == RenewalAction::Expire {
        SubscriptionRepo::close(&mut *tx, subscription.id, SubscriptionStatus::Expired).await?;
        tx.commit().await?;

        notify_user(
            pool,
            push,
            subscription.user_id,
            "Subscription expired",
            "Your subscription has ended. Subscribe again to keep premium features.",
            "subscription",
        )
        .await?;
        return Ok(Some(SubscriptionStatus::Expired));
    }

    let plan = SubscriptionRepo::find_plan(pool, subscription.plan_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("plan {} is missing", subscription.plan_id))?;
    let method = match subscription.payment_method_id {
        Some(id) => PaymentMethodRepo::find(pool, subscription.user_id, id).await?,
        None => None,
    };

    let outcome = gateway.charge(method.as_ref(), plan.price, now);
    let status = match outcome {
        Ok(_) => SubscriptionStatus::Renewed,
        Err(_) => SubscriptionStatus::PaymentFailed,
    };

    SubscriptionRepo::close(&mut *tx, subscription.id, status).await?;
    TransactionRepo::insert(
        &mut *tx,
        &subscription_charge(subscription.user_id, &plan, method.as_ref(), &outcome),
    )
    .await?;

    if outcome.is_ok() {
        let (start_date, end_date) = next_period(subscription.end_date, plan.interval_days);
        let next = SubscriptionRepo::insert(
            &mut *tx,
            &NewSubscription {
                user_id: subscription.user_id,
                plan_id: plan.id,
                payment_method_id: subscription.payment_method_id,
                previous_subscription_id: Some(subscription.id),
                auto_renew: true,
                start_date,
                end_date,
            },
        )
        .await?;
        tx.commit().await?;
        info!("Renewed subscription {} as {}", subscription.id, next.id);
        return Ok(Some(status));
    }

    tx.commit().await?;
    if let Err(e) = &outcome {
        warn!("Renewal of subscription {} failed: {}", subscription.id, e);
    }
    notify_user(
        pool,
        push,
        subscription.user_id,
        "Subscription payment failed",
        &format!(
            "We could not renew your {} subscription. Update your payment method and subscribe again.",
            plan.name
        ),
        "subscription",
    )
    .await?;
    Ok(Some(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sqlx::types::Json;

    fn subscription(auto_renew: bool) -> Subscription {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Subscription {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
            payment_method_id: None,
            previous_subscription_id: None,
            status: SubscriptionStatus::Active,
            auto_renew,
            start_date: start,
            end_date: start + Duration::days(30),
            cancelled_at: None,
            created_at: start,
            updated_at: start,
        }
    }

    fn plan() -> SubscriptionPlan {
        SubscriptionPlan {
            id: Uuid::new_v4(),
            name: "Pro".to_string(),
            price: 1_999,
            interval_days: 30,
            features: Json(vec!["advice".to_string()]),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn action_follows_auto_renew() {
        assert_eq!(RenewalAction::for_subscription(&subscription(true)), RenewalAction::Renew);
        assert_eq!(RenewalAction::for_subscription(&subscription(false)), RenewalAction::Expire);
    }

    #[test]
    fn next_period_starts_where_previous_ended() {
        let old = subscription(true);
        let (start, end) = next_period(old.end_date, 30);
        assert_eq!(start, old.end_date);
        assert_eq!(end - start, Duration::days(30));
        assert!(end > start);
    }

    #[test]
    fn charge_entry_reflects_outcome() {
        let user = Uuid::new_v4();
        let ok = Ok(ChargeReceipt {
            reference: "ch_abc".to_string(),
            amount: 1_999,
        });
        let entry = subscription_charge(user, &plan(), None, &ok);
        assert_eq!(entry.status, TransactionStatus::Completed);
        assert_eq!(entry.tx_type, TransactionType::Subscription);
        assert_eq!(entry.amount, 1_999);
        assert_eq!(entry.reference.as_deref(), Some("ch_abc"));

        let declined = Err(PaymentError::Declined);
        let entry = subscription_charge(user, &plan(), None, &declined);
        assert_eq!(entry.status, TransactionStatus::Failed);
        assert!(entry.reference.is_none());
        assert!(entry.description.unwrap().contains("declined"));
    }
}
