// Profile management and admin user administration

use axum::extract::State;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::{AdminUser, AuthUser};
use crate::database::UserRepo;
use crate::error::{ApiError, ApiResult};
use crate::models::{UpdateProfileRequest, UpdateRoleRequest, UserProfile, UserSearchQuery};
use crate::response::{ApiJson, ApiPath, ApiQuery, ApiResponse, PageQuery, Paginated};
use crate::validation::Validator;
use crate::AppState;

pub async fn update_me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<ApiResponse<UserProfile>> {
    let mut v = Validator::new();
    if let Some(name) = &req.full_name {
        v.length("full_name", name, 1, 100);
    }
    if let Some(phone) = &req.phone {
        v.phone("phone", phone.trim());
    }
    v.finish()?;

    let user = UserRepo::update_profile(
        &state.db,
        auth.id(),
        req.full_name.as_deref().map(str::trim),
        req.phone.as_deref().map(str::trim),
    )
    .await?;
    Ok(ApiResponse::ok(user.into()))
}

pub async fn delete_me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> ApiResult<ApiResponse<()>> {
    UserRepo::delete(&state.db, auth.id()).await?;
    info!("User {} deleted their account", auth.id());
    Ok(ApiResponse::message("Account deleted"))
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiQuery(page): ApiQuery<PageQuery>,
    ApiQuery(query): ApiQuery<UserSearchQuery>,
) -> ApiResult<ApiResponse<Paginated<UserProfile>>> {
    let search = query.search.as_deref().filter(|s| !s.trim().is_empty());
    let (users, total) = UserRepo::list(&state.db, search, page.limit(), page.offset()).await?;
    let profiles = users.into_iter().map(UserProfile::from).collect();
    Ok(ApiResponse::ok(Paginated::new(profiles, &page, total)))
}

pub async fn update_role(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateRoleRequest>,
) -> ApiResult<ApiResponse<UserProfile>> {
    if id == admin.id() {
        return Err(ApiError::bad_request("You cannot change your own role"));
    }

    let user = UserRepo::update_role(&state.db, id, req.role)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    info!("Admin {} set role of {} to {:?}", admin.id(), user.id, user.role);
    Ok(ApiResponse::ok(user.into()))
}
