// In-app notifications and push device registration

use axum::extract::State;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::{AdminUser, AuthUser};
use crate::database::NotificationRepo;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    BroadcastRequest, DeviceToken, Notification, NotificationQuery, RegisterDeviceRequest,
};
use crate::response::{ApiJson, ApiPath, ApiQuery, ApiResponse, PageQuery, Paginated};
use crate::services::push;
use crate::validation::Validator;
use crate::AppState;

pub async fn list(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiQuery(page): ApiQuery<PageQuery>,
    ApiQuery(query): ApiQuery<NotificationQuery>,
) -> ApiResult<ApiResponse<Paginated<Notification>>> {
    let (items, total) = NotificationRepo::list(
        &state.db,
        auth.id(),
        query.unread_only,
        page.limit(),
        page.offset(),
    )
    .await?;
    Ok(ApiResponse::ok(Paginated::new(items, &page, total)))
}

pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> ApiResult<ApiResponse<Value>> {
    let count = NotificationRepo::unread_count(&state.db, auth.id()).await?;
    Ok(ApiResponse::ok(json!({ "unread": count })))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Notification>> {
    let notification = NotificationRepo::mark_read(&state.db, auth.id(), id)
        .await?
        .ok_or(ApiError::NotFound("Notification"))?;
    Ok(ApiResponse::ok(notification))
}

pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> ApiResult<ApiResponse<Value>> {
    let updated = NotificationRepo::mark_all_read(&state.db, auth.id()).await?;
    Ok(ApiResponse::ok(json!({ "updated": updated })))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    if !NotificationRepo::delete(&state.db, auth.id(), id).await? {
        return Err(ApiError::NotFound("Notification"));
    }
    Ok(ApiResponse::message("Notification deleted"))
}

pub async fn register_device(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(req): ApiJson<RegisterDeviceRequest>,
) -> ApiResult<ApiResponse<DeviceToken>> {
    Validator::new()
        .length("token", &req.token, 1, 4096)
        .finish()?;

    let device =
        NotificationRepo::upsert_device(&state.db, auth.id(), req.token.trim(), req.platform)
            .await?;
    Ok(ApiResponse::created(device))
}

pub async fn remove_device(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiPath(token): ApiPath<String>,
) -> ApiResult<ApiResponse<()>> {
    if !NotificationRepo::delete_device(&state.db, auth.id(), &token).await? {
        return Err(ApiError::NotFound("Device"));
    }
    Ok(ApiResponse::message("Device removed"))
}

pub async fn broadcast(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ApiJson(req): ApiJson<BroadcastRequest>,
) -> ApiResult<ApiResponse<Value>> {
    Validator::new()
        .length("title", &req.title, 1, 200)
        .length("body", &req.body, 1, 2000)
        .finish()?;

    let recipients =
        push::broadcast(&state.db, &state.push, req.title.trim(), req.body.trim()).await?;

    info!("Admin {} broadcast \"{}\" to {} user(s)", admin.id(), req.title.trim(), recipients);
    Ok(ApiResponse::created(json!({ "recipients": recipients })))
}
