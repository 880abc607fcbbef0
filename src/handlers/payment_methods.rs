// Stored payment methods

use axum::extract::State;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::database::PaymentMethodRepo;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    is_expiry_past, CreatePaymentMethodRequest, EXPIRY_YEARS, PaymentMethod, PaymentMethodKind,
    UpdatePaymentMethodRequest,
};
use crate::response::{ApiJson, ApiPath, ApiResponse};
use crate::validation::Validator;
use crate::AppState;

fn check_expiry(v: &mut Validator, month: Option<i32>, year: Option<i32>) {
    if let Some(month) = month {
        v.check((1..=12).contains(&month), "expiry_month", "must be between 1 and 12");
    }
    if let Some(year) = year {
        v.check(
            EXPIRY_YEARS.contains(&year),
            "expiry_year",
            &format!(
                "must be between {} and {}",
                EXPIRY_YEARS.start(),
                EXPIRY_YEARS.end()
            ),
        );
    }
    if let (Some(month), Some(year)) = (month, year) {
        v.check(
            !is_expiry_past(month, year, Utc::now()),
            "expiry_year",
            "card has expired",
        );
    }
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> ApiResult<ApiResponse<Vec<PaymentMethod>>> {
    let methods = PaymentMethodRepo::list(&state.db, auth.id()).await?;
    Ok(ApiResponse::ok(methods))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(req): ApiJson<CreatePaymentMethodRequest>,
) -> ApiResult<ApiResponse<PaymentMethod>> {
    let mut v = Validator::new();
    v.length("provider", &req.provider, 1, 50)
        .digits("last4", &req.last4, 4, 4);
    if req.kind == PaymentMethodKind::Card {
        v.check(
            req.expiry_month.is_some() && req.expiry_year.is_some(),
            "expiry",
            "cards require expiry_month and expiry_year",
        );
    }
    check_expiry(&mut v, req.expiry_month, req.expiry_year);
    v.finish()?;

    let method = PaymentMethodRepo::create(&state.db, auth.id(), &req).await?;
    info!("User {} added payment method {}", auth.id(), method.id);
    Ok(ApiResponse::created(method))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<PaymentMethod>> {
    let method = PaymentMethodRepo::find(&state.db, auth.id(), id)
        .await?
        .ok_or(ApiError::NotFound("Payment method"))?;
    Ok(ApiResponse::ok(method))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdatePaymentMethodRequest>,
) -> ApiResult<ApiResponse<PaymentMethod>> {
    let current = PaymentMethodRepo::find(&state.db, auth.id(), id)
        .await?
        .ok_or(ApiError::NotFound("Payment method"))?;

    let mut v = Validator::new();
    if let Some(provider) = &req.provider {
        v.length("provider", provider, 1, 50);
    }
    check_expiry(
        &mut v,
        req.expiry_month.or(current.expiry_month),
        req.expiry_year.or(current.expiry_year),
    );
    v.finish()?;

    let method = PaymentMethodRepo::update(&state.db, auth.id(), id, &req)
        .await?
        .ok_or(ApiError::NotFound("Payment method"))?;
    Ok(ApiResponse::ok(method))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    if !PaymentMethodRepo::delete(&state.db, auth.id(), id).await? {
        return Err(ApiError::NotFound("Payment method"));
    }
    info!("User {} removed payment method {}", auth.id(), id);
    Ok(ApiResponse::message("Payment method removed"))
}

pub async fn set_default(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<PaymentMethod>> {
    let method = PaymentMethodRepo::set_default(&state.db, auth.id(), id)
        .await?
        .ok_or(ApiError::NotFound("Payment method"))?;
    Ok(ApiResponse::ok(method).with_message("Default payment method updated"))
}
