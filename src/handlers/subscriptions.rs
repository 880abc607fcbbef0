// Subscription plans and user subscriptions

use axum::extract::State;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::{AdminUser, AuthUser};
use crate::database::SubscriptionRepo;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AutoRenewRequest, CreatePlanRequest, SubscribeRequest, Subscription, SubscriptionPlan,
    SubscriptionStatus,
};
use crate::response::{ApiJson, ApiPath, ApiQuery, ApiResponse, PageQuery, Paginated};
use crate::services::subscriptions;
use crate::validation::Validator;
use crate::AppState;

pub async fn plans(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
) -> ApiResult<ApiResponse<Vec<SubscriptionPlan>>> {
    let plans = SubscriptionRepo::active_plans(&state.db).await?;
    Ok(ApiResponse::ok(plans))
}

pub async fn create_plan(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiJson(req): ApiJson<CreatePlanRequest>,
) -> ApiResult<ApiResponse<SubscriptionPlan>> {
    let mut v = Validator::new();
    v.length("name", &req.name, 1, 100)
        .positive_amount("price", req.price)
        .check(
            (1..=366).contains(&req.interval_days),
            "interval_days",
            "must be between 1 and 366",
        );
    for feature in &req.features {
        v.length("features", feature, 1, 200);
    }
    v.finish()?;

    let plan = SubscriptionRepo::create_plan(&state.db, &req).await?;
    info!("Created subscription plan {} ({})", plan.name, plan.id);
    Ok(ApiResponse::created(plan))
}

pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(req): ApiJson<SubscribeRequest>,
) -> ApiResult<ApiResponse<Subscription>> {
    let subscription = subscriptions::subscribe(&state.db, &state.gateway, auth.id(), &req).await?;
    Ok(ApiResponse::created(subscription))
}

pub async fn current(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> ApiResult<ApiResponse<Option<Subscription>>> {
    let subscription = SubscriptionRepo::find_active(&state.db, auth.id()).await?;
    Ok(ApiResponse::ok(subscription))
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> ApiResult<ApiResponse<Paginated<Subscription>>> {
    let (items, total) =
        SubscriptionRepo::list(&state.db, auth.id(), page.limit(), page.offset()).await?;
    Ok(ApiResponse::ok(Paginated::new(items, &page, total)))
}

pub async fn cancel(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Subscription>> {
    let subscription = SubscriptionRepo::find(&state.db, auth.id(), id)
        .await?
        .ok_or(ApiError::NotFound("Subscription"))?;

    let cancelled = SubscriptionRepo::close(&state.db, subscription.id, SubscriptionStatus::Cancelled)
        .await?
        .ok_or_else(|| ApiError::bad_request("Only active subscriptions can be cancelled"))?;

    info!("User {} cancelled subscription {}", auth.id(), id);
    Ok(ApiResponse::ok(cancelled).with_message("Subscription cancelled"))
}

pub async fn set_auto_renew(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<AutoRenewRequest>,
) -> ApiResult<ApiResponse<Subscription>> {
    match SubscriptionRepo::set_auto_renew(&state.db, auth.id(), id, req.auto_renew).await? {
        Some(subscription) => Ok(ApiResponse::ok(subscription)),
        None => match SubscriptionRepo::find(&state.db, auth.id(), id).await? {
            Some(_) => Err(ApiError::bad_request(
                "Auto-renew can only be changed on an active subscription",
            )),
            None => Err(ApiError::NotFound("Subscription")),
        },
    }
}
