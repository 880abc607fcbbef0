// Funding positions

use axum::extract::State;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{AdminUser, AuthUser};
use crate::database::FundingRepo;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    CreateFundingRequest, Funding, FundingQuery, RecordEarningsRequest, Transaction,
    UpdateFundingRequest, UpdateFundingStatusRequest,
};
use crate::response::{ApiJson, ApiPath, ApiQuery, ApiResponse, PageQuery, Paginated};
use crate::services::fundings;
use crate::validation::Validator;
use crate::AppState;

pub async fn list(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiQuery(page): ApiQuery<PageQuery>,
    ApiQuery(query): ApiQuery<FundingQuery>,
) -> ApiResult<ApiResponse<Paginated<Funding>>> {
    let (items, total) = FundingRepo::list(
        &state.db,
        auth.id(),
        query.status,
        query.platform_id,
        page.limit(),
        page.offset(),
    )
    .await?;
    Ok(ApiResponse::ok(Paginated::new(items, &page, total)))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(req): ApiJson<CreateFundingRequest>,
) -> ApiResult<ApiResponse<Funding>> {
    Validator::new()
        .positive_amount("amount", req.amount)
        .percentage("profit_share", req.profit_share)
        .finish()?;

    let funding = fundings::create(&state.db, auth.id(), &req).await?;
    Ok(ApiResponse::created(funding))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Funding>> {
    let funding = FundingRepo::find(&state.db, auth.id(), id)
        .await?
        .ok_or(ApiError::NotFound("Funding"))?;
    Ok(ApiResponse::ok(funding))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateFundingRequest>,
) -> ApiResult<ApiResponse<Funding>> {
    let mut v = Validator::new();
    if let Some(amount) = req.amount {
        v.positive_amount("amount", amount);
    }
    if let Some(share) = req.profit_share {
        v.percentage("profit_share", share);
    }
    v.finish()?;

    let funding =
        fundings::update_terms(&state.db, auth.id(), id, req.amount, req.profit_share).await?;
    Ok(ApiResponse::ok(funding))
}

pub async fn change_status(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateFundingStatusRequest>,
) -> ApiResult<ApiResponse<Funding>> {
    let funding = fundings::change_status(&state.db, auth.id(), id, req.status).await?;
    Ok(ApiResponse::ok(funding))
}

pub async fn record_earnings(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<RecordEarningsRequest>,
) -> ApiResult<ApiResponse<Transaction>> {
    let mut v = Validator::new();
    v.positive_amount("gross_amount", req.gross_amount);
    if let Some(description) = &req.description {
        v.length("description", description, 1, 500);
    }
    v.finish()?;

    let transaction = fundings::record_earnings(
        &state.db,
        &state.push,
        id,
        req.gross_amount,
        req.description.as_deref().map(str::trim),
    )
    .await?;
    Ok(ApiResponse::created(transaction))
}
