// Portfolio and platform-wide reports

use axum::extract::State;
use std::sync::Arc;

use crate::auth::{AdminUser, AuthUser};
use crate::error::ApiResult;
use crate::response::{ApiQuery, ApiResponse};
use crate::services::analytics::{self, AdminReport, Overview, PlatformStats, ProfitBucket, ProfitQuery};
use crate::AppState;

pub async fn overview(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> ApiResult<ApiResponse<Overview>> {
    Ok(ApiResponse::ok(analytics::user_overview(&state.db, auth.id()).await?))
}

pub async fn profit(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<ProfitQuery>,
) -> ApiResult<ApiResponse<Vec<ProfitBucket>>> {
    Ok(ApiResponse::ok(analytics::user_profit(&state.db, auth.id(), &query).await?))
}

pub async fn platforms(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> ApiResult<ApiResponse<Vec<PlatformStats>>> {
    Ok(ApiResponse::ok(analytics::user_platforms(&state.db, auth.id()).await?))
}

pub async fn admin(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> ApiResult<ApiResponse<AdminReport>> {
    Ok(ApiResponse::ok(analytics::platform_report(&state.db).await?))
}
