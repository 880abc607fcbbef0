// Funding lifecycle: open, change status, record platform earnings

use tracing::{error, info};
use uuid::Uuid;

use super::push::{notify_user, PushClient};
use crate::database::{DbPool, FundingRepo, PlatformRepo, TransactionRepo, UserRepo};
use crate::error::ApiError;
use crate::models::{
    CreateFundingRequest, Funding, FundingStatus, Platform, NewTransaction, Transaction,
    TransactionStatus, TransactionType,
};

const DUPLICATE_ACTIVE: &str = "You already have an active funding on this platform";

/// Open a funding and record its DEPOSIT. The one-active-per-platform check
/// and the insert run under the user's row lock.
pub async fn create(
    pool: &DbPool,
    user_id: Uuid,
    req: &CreateFundingRequest,
) -> Result<Funding, ApiError> {
    let platform = PlatformRepo::find(pool, req.platform_id)
        .await?
        .ok_or(ApiError::NotFound("Platform"))?;

    if !platform.is_active {
        return Err(ApiError::bad_request("Platform is not accepting new fundings"));
    }
    if let Some(err) = below_minimum(req.amount, &platform) {
        return Err(err);
    }

    let mut tx = pool.begin().await?;
    if !UserRepo::lock(&mut *tx, user_id).await? {
        return Err(ApiError::NotFound("User"));
    }
    if FundingRepo::has_active(&mut *tx, user_id, platform.id, None).await? {
        return Err(ApiError::bad_request(DUPLICATE_ACTIVE));
    }

    let funding =
        FundingRepo::insert(&mut *tx, user_id, platform.id, req.amount, req.profit_share).await?;

    let mut deposit = NewTransaction::new(
        user_id,
        TransactionType::Deposit,
        TransactionStatus::Completed,
        funding.amount,
    );
    deposit.funding_id = Some(funding.id);
    deposit.description = Some(format!("Funding on {}", platform.name));
    TransactionRepo::insert(&mut *tx, &deposit).await?;

    tx.commit().await?;

    info!("User {} opened funding {} on {}", user_id, funding.id, platform.name);
    Ok(funding)
}

fn below_minimum(amount: i64, platform: &Platform) -> Option<ApiError> {
    (amount < platform.min_investment).then(|| {
        ApiError::bad_request(format!(
            "Minimum investment for {} is {}",
            platform.name, platform.min_investment
        ))
    })
}

fn locked_terms(funding: &Funding) -> Option<ApiError> {
    funding.status.is_terminal().then(|| {
        ApiError::bad_request(format!(
            "A {} funding can no longer be changed",
            funding.status.as_str()
        ))
    })
}

/// Change amount or profit share of an open funding, under the user's lock
pub async fn update_terms(
    pool: &DbPool,
    user_id: Uuid,
    id: Uuid,
    amount: Option<i64>,
    profit_share: Option<i32>,
) -> Result<Funding, ApiError> {
    let mut tx = pool.begin().await?;
    if !UserRepo::lock(&mut *tx, user_id).await? {
        return Err(ApiError::NotFound("User"));
    }

    let funding = FundingRepo::find(&mut *tx, user_id, id)
        .await?
        .ok_or(ApiError::NotFound("Funding"))?;
    if let Some(err) = locked_terms(&funding) {
        return Err(err);
    }

    if let Some(amount) = amount {
        let platform = PlatformRepo::find(pool, funding.platform_id)
            .await?
            .ok_or(ApiError::NotFound("Platform"))?;
        if let Some(err) = below_minimum(amount, &platform) {
            return Err(err);
        }
    }

    let updated = FundingRepo::update_terms(&mut *tx, user_id, id, amount, profit_share)
        .await?
        .ok_or_else(|| ApiError::bad_request("Funding can no longer be changed"))?;
    tx.commit().await?;
    Ok(updated)
}

pub async fn change_status(
    pool: &DbPool,
    user_id: Uuid,
    id: Uuid,
    next: FundingStatus,
) -> Result<Funding, ApiError> {
    let mut tx = pool.begin().await?;
    if !UserRepo::lock(&mut *tx, user_id).await? {
        return Err(ApiError::NotFound("User"));
    }

    let funding = FundingRepo::find(&mut *tx, user_id, id)
        .await?
        .ok_or(ApiError::NotFound("Funding"))?;

    if !funding.status.can_transition_to(next) {
        return Err(ApiError::bad_request(format!(
            "Cannot change funding status from {} to {}",
            funding.status.as_str(),
            next.as_str()
        )));
    }

    if next == FundingStatus::Active
        && FundingRepo::has_active(&mut *tx, user_id, funding.platform_id, Some(funding.id)).await?
    {
        return Err(ApiError::bad_request(DUPLICATE_ACTIVE));
    }

    let updated = FundingRepo::set_status(&mut *tx, funding.id, next).await?;
    tx.commit().await?;

    info!(
        "Funding {} moved from {} to {}",
        funding.id,
        funding.status.as_str(),
        next.as_str()
    );
    Ok(updated)
}

/// Credit the owner's share of `gross_amount` as a COMPLETED PROFIT entry
pub async fn record_earnings(
    pool: &DbPool,
    push: &PushClient,
    funding_id: Uuid,
    gross_amount: i64,
    description: Option<&str>,
) -> Result<Transaction, ApiError> {
    let funding = FundingRepo::find_by_id(pool, funding_id)
        .await?
        .ok_or(ApiError::NotFound("Funding"))?;

    if funding.status != FundingStatus::Active {
        return Err(ApiError::bad_request("Earnings can only be recorded on an active funding"));
    }

    let profit = funding.profit_from(gross_amount);
    let mut entry = NewTransaction::new(
        funding.user_id,
        TransactionType::Profit,
        TransactionStatus::Completed,
        profit,
    );
    entry.funding_id = Some(funding.id);
    entry.description = Some(
        description
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}% share of {}", funding.profit_share, gross_amount)),
    );

    let transaction = TransactionRepo::insert(pool, &entry).await?;
    info!(
        "Recorded profit {} (gross {}) on funding {}",
        profit, gross_amount, funding.id
    );

    if let Err(e) = notify_user(
        pool,
        push,
        funding.user_id,
        "New earnings",
        &format!("You earned {} from one of your fundings.", profit),
        "earnings",
    )
    .await
    {
        error!("Failed to notify user {} of earnings: {}", funding.user_id, e);
    }

    Ok(transaction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlatformCategory;
    use chrono::Utc;

    fn platform(min_investment: i64) -> Platform {
        let now = Utc::now();
        Platform {
            id: Uuid::new_v4(),
            name: "LendCo".to_string(),
            category: PlatformCategory::P2pLending,
            description: None,
            website_url: None,
            min_investment,
            expected_return_pct: Some(8.5),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn funding(status: FundingStatus) -> Funding {
        let now = Utc::now();
        Funding {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            platform_id: Uuid::new_v4(),
            amount: 10_000,
            profit_share: 50,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn amount_below_platform_minimum_is_refused() {
        assert!(below_minimum(4_999, &platform(5_000)).is_some());
        assert!(below_minimum(5_000, &platform(5_000)).is_none());
        assert!(below_minimum(1, &platform(0)).is_none());
    }

    #[test]
    fn closed_fundings_keep_their_terms() {
        assert!(locked_terms(&funding(FundingStatus::Completed)).is_some());
        assert!(locked_terms(&funding(FundingStatus::Cancelled)).is_some());
        assert!(locked_terms(&funding(FundingStatus::Active)).is_none());
        assert!(locked_terms(&funding(FundingStatus::Paused)).is_none());
    }
}
