// Funding platform catalogue and user connections

use axum::extract::State;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::{AdminUser, AuthUser};
use crate::database::PlatformRepo;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    ConnectPlatformRequest, CreatePlatformRequest, Platform, PlatformConnection, PlatformQuery,
    UpdatePlatformRequest,
};
use crate::response::{ApiJson, ApiPath, ApiQuery, ApiResponse, PageQuery, Paginated};
use crate::validation::Validator;
use crate::AppState;

fn check_terms(
    v: &mut Validator,
    website_url: Option<&str>,
    min_investment: Option<i64>,
    expected_return_pct: Option<f64>,
) {
    if let Some(url) = website_url {
        v.check(
            url.starts_with("https://") || url.starts_with("http://"),
            "website_url",
            "must be an http(s) URL",
        );
    }
    if let Some(min) = min_investment {
        v.check(min >= 0, "min_investment", "must not be negative");
    }
    if let Some(pct) = expected_return_pct {
        v.check(
            pct.is_finite() && (0.0..=1000.0).contains(&pct),
            "expected_return_pct",
            "must be between 0 and 1000",
        );
    }
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    ApiQuery(page): ApiQuery<PageQuery>,
    ApiQuery(query): ApiQuery<PlatformQuery>,
) -> ApiResult<ApiResponse<Paginated<Platform>>> {
    let (platforms, total) =
        PlatformRepo::list_active(&state.db, query.category, page.limit(), page.offset()).await?;
    Ok(ApiResponse::ok(Paginated::new(platforms, &page, total)))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Platform>> {
    let platform = PlatformRepo::find(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Platform"))?;
    Ok(ApiResponse::ok(platform))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiJson(req): ApiJson<CreatePlatformRequest>,
) -> ApiResult<ApiResponse<Platform>> {
    let mut v = Validator::new();
    v.length("name", &req.name, 1, 100);
    check_terms(
        &mut v,
        req.website_url.as_deref(),
        Some(req.min_investment),
        req.expected_return_pct,
    );
    v.finish()?;

    let platform = PlatformRepo::create(&state.db, &req).await?;
    info!("Created platform {} ({})", platform.name, platform.id);
    Ok(ApiResponse::created(platform))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdatePlatformRequest>,
) -> ApiResult<ApiResponse<Platform>> {
    let mut v = Validator::new();
    if let Some(name) = &req.name {
        v.length("name", name, 1, 100);
    }
    check_terms(
        &mut v,
        req.website_url.as_deref(),
        req.min_investment,
        req.expected_return_pct,
    );
    v.finish()?;

    let platform = PlatformRepo::update(&state.db, id, &req)
        .await?
        .ok_or(ApiError::NotFound("Platform"))?;
    Ok(ApiResponse::ok(platform))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    let removed = PlatformRepo::delete_or_deactivate(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Platform"))?;

    if removed {
        info!("Deleted platform {}", id);
        Ok(ApiResponse::message("Platform deleted"))
    } else {
        info!("Platform {} has fundings, deactivated instead of deleted", id);
        Ok(ApiResponse::message("Platform has fundings and was deactivated"))
    }
}

pub async fn connections(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> ApiResult<ApiResponse<Vec<PlatformConnection>>> {
    let connections = PlatformRepo::connections(&state.db, auth.id()).await?;
    Ok(ApiResponse::ok(connections))
}

pub async fn connect(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ConnectPlatformRequest>,
) -> ApiResult<ApiResponse<PlatformConnection>> {
    Validator::new()
        .length("external_account_id", &req.external_account_id, 1, 200)
        .finish()?;

    let platform = PlatformRepo::find(&state.db, id)
        .await?
        .filter(|p| p.is_active)
        .ok_or(ApiError::NotFound("Platform"))?;

    let connection =
        PlatformRepo::connect(&state.db, auth.id(), platform.id, req.external_account_id.trim())
            .await?;
    info!("User {} connected platform {}", auth.id(), platform.name);
    Ok(ApiResponse::ok(connection))
}

pub async fn disconnect(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<PlatformConnection>> {
    let connection = PlatformRepo::disconnect(&state.db, auth.id(), id)
        .await?
        .ok_or(ApiError::NotFound("Platform connection"))?;
    Ok(ApiResponse::ok(connection).with_message("Platform disconnected"))
}
