// Registration, login and session management

use axum::extract::State;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::info;

use crate::auth::{
    check_verification_code, generate_verification_code, hash_password, hash_secret,
    issue_session, verify_password, AuthUser, CodeCheck, MAX_VERIFICATION_ATTEMPTS,
    VERIFICATION_TTL_HOURS,
};
use crate::database::{is_unique_violation, SessionRepo, UserRepo};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AuthResponse, ChangePasswordRequest, LoginRequest, RegisterRequest, User, UserProfile,
    VerifyEmailRequest,
};
use crate::response::{ApiJson, ApiResponse};
use crate::validation::{normalize_email, Validator};
use crate::AppState;

const BAD_CREDENTIALS: &str = "Invalid email or password";

/// Store a fresh verification code. There is no mail provider, so the code
/// goes to the log.
async fn send_verification(state: &AppState, user: &User) -> ApiResult<()> {
    let code = generate_verification_code();
    let expires_at = Utc::now() + Duration::hours(VERIFICATION_TTL_HOURS);
    UserRepo::set_verification_code(&state.db, user.id, &hash_secret(&code), expires_at).await?;
    info!("Verification code for {}: {}", user.email, code);
    Ok(())
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<ApiResponse<AuthResponse>> {
    let email = normalize_email(&req.email);
    Validator::new()
        .email("email", &email)
        .password("password", &req.password)
        .length("full_name", &req.full_name, 1, 100)
        .finish()?;

    if UserRepo::find_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::bad_request("Email is already registered"));
    }

    let password_hash = hash_password(&req.password)?;
    let user = UserRepo::create(&state.db, &email, &password_hash, req.full_name.trim())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::bad_request("Email is already registered")
            } else {
                e.into()
            }
        })?;

    send_verification(&state, &user).await?;
    let (token, expires_at) =
        issue_session(&state.db, user.id, state.config.session_ttl_hours).await?;

    info!("Registered user {}", user.id);
    Ok(ApiResponse::created(AuthResponse {
        user: user.into(),
        token,
        expires_at,
    })
    .with_message("Registration successful"))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<ApiResponse<AuthResponse>> {
    let email = normalize_email(&req.email);
    Validator::new()
        .email("email", &email)
        .length("password", &req.password, 1, 128)
        .finish()?;

    let user = UserRepo::find_by_email(&state.db, &email)
        .await?
        .filter(|u| verify_password(&req.password, &u.password_hash))
        .ok_or_else(|| ApiError::unauthorized(BAD_CREDENTIALS))?;

    let (token, expires_at) =
        issue_session(&state.db, user.id, state.config.session_ttl_hours).await?;

    info!("User {} logged in", user.id);
    Ok(ApiResponse::ok(AuthResponse {
        user: user.into(),
        token,
        expires_at,
    }))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> ApiResult<ApiResponse<()>> {
    SessionRepo::revoke(&state.db, auth.session_id).await?;
    Ok(ApiResponse::message("Logged out"))
}

pub async fn me(auth: AuthUser) -> ApiResponse<UserProfile> {
    ApiResponse::ok(auth.user.into())
}

pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(req): ApiJson<VerifyEmailRequest>,
) -> ApiResult<ApiResponse<UserProfile>> {
    Validator::new().digits("code", req.code.trim(), 6, 6).finish()?;

    let mut tx = state.db.begin().await?;
    UserRepo::lock(&mut *tx, auth.id()).await?;
    let user = UserRepo::find_by_id(&mut *tx, auth.id())
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    if user.is_verified {
        return Err(ApiError::bad_request("Email is already verified"));
    }

    match check_verification_code(&user, req.code.trim(), Utc::now()) {
        CodeCheck::Valid => {}
        CodeCheck::Unavailable => {
            return Err(ApiError::bad_request(
                "No valid verification code, request a new one",
            ));
        }
        CodeCheck::Wrong => {
            let attempts =
                UserRepo::record_failed_verification(&mut *tx, user.id, MAX_VERIFICATION_ATTEMPTS)
                    .await?;
            tx.commit().await?;
            let left = MAX_VERIFICATION_ATTEMPTS - attempts;
            return Err(ApiError::bad_request(if left > 0 {
                format!("Invalid verification code, {} attempt(s) left", left)
            } else {
                "Invalid verification code, request a new one".to_string()
            }));
        }
    }

    let user = UserRepo::mark_verified(&mut *tx, user.id).await?;
    tx.commit().await?;
    info!("User {} verified their email", user.id);
    Ok(ApiResponse::ok(user.into()).with_message("Email verified"))
}

pub async fn resend_verification(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> ApiResult<ApiResponse<()>> {
    if auth.user.is_verified {
        return Err(ApiError::bad_request("Email is already verified"));
    }
    send_verification(&state, &auth.user).await?;
    Ok(ApiResponse::message("Verification code sent"))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<ApiResponse<()>> {
    Validator::new()
        .password("new_password", &req.new_password)
        .check(
            req.new_password != req.current_password,
            "new_password",
            "must differ from the current password",
        )
        .finish()?;

    if !verify_password(&req.current_password, &auth.user.password_hash) {
        return Err(ApiError::unauthorized("Current password is incorrect"));
    }

    let password_hash = hash_password(&req.new_password)?;
    UserRepo::update_password(&state.db, auth.id(), &password_hash).await?;
    let revoked = SessionRepo::revoke_others(&state.db, auth.id(), auth.session_id).await?;

    info!("User {} changed password, {} other session(s) revoked", auth.id(), revoked);
    Ok(ApiResponse::message("Password changed"))
}
