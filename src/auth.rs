// Credentials, bearer sessions and the authenticated-user extractor

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use blake2::{Blake2s256, Digest};
use chrono::{DateTime, Duration, Utc};
use rand::{Rng, RngCore};
use std::sync::Arc;
use uuid::Uuid;

use crate::database::{DbPool, SessionRepo};
use crate::error::ApiError;
use crate::models::{User, UserRole};
use crate::AppState;

const TOKEN_BYTES: usize = 32;

/// How long an email verification code stays valid
pub const VERIFICATION_TTL_HOURS: i64 = 24;

/// Wrong guesses allowed before a verification code is discarded
pub const MAX_VERIFICATION_ATTEMPTS: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeCheck {
    Valid,
    Wrong,
    /// No live code: never issued, expired, or out of attempts
    Unavailable,
}

pub fn check_verification_code(user: &User, code: &str, now: DateTime<Utc>) -> CodeCheck {
    match (&user.verification_code_hash, user.verification_expires_at) {
        (Some(stored), Some(expires_at))
            if expires_at > now && user.verification_attempts < MAX_VERIFICATION_ATTEMPTS =>
        {
            if *stored == hash_secret(code) {
                CodeCheck::Valid
            } else {
                CodeCheck::Wrong
            }
        }
        _ => CodeCheck::Unavailable,
    }
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Fresh opaque bearer token (hex)
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Digest stored in place of a token or verification code
pub fn hash_secret(secret: &str) -> String {
    hex::encode(Blake2s256::digest(secret.as_bytes()))
}

pub fn generate_verification_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

/// Create a session and return the raw token, which is never stored
pub async fn issue_session(
    pool: &DbPool,
    user_id: Uuid,
    ttl_hours: i64,
) -> Result<(String, DateTime<Utc>), ApiError> {
    let token = generate_token();
    let expires_at = Utc::now() + Duration::hours(ttl_hours);
    SessionRepo::create(pool, user_id, &hash_secret(&token), expires_at).await?;
    Ok((token, expires_at))
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// The caller of an authenticated route
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub session_id: Uuid,
}

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.user.role == UserRole::Admin
    }
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::unauthorized("Missing or malformed bearer token"))?;

        let (session, user) = SessionRepo::find_active(&state.db, &hash_secret(token))
            .await?
            .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

        Ok(AuthUser {
            user,
            session_id: session.id,
        })
    }
}

/// An authenticated caller with the ADMIN role
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        if !auth.is_admin() {
            return Err(ApiError::Forbidden("Admin access required".to_string()));
        }
        Ok(AdminUser(auth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/auth/me");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn password_round_trip() {
        let hash = hash_password("correct horse 1").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse 1", &hash));
        assert!(!verify_password("wrong horse 1", &hash));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn tokens_are_unique_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn secret_digest_is_stable() {
        assert_eq!(hash_secret("abc"), hash_secret("abc"));
        assert_ne!(hash_secret("abc"), hash_secret("abd"));
        assert_eq!(hash_secret("abc").len(), 64);
    }

    #[test]
    fn verification_codes_are_six_digits() {
        for _ in 0..50 {
            let code = generate_verification_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    fn pending_user(code: &str, attempts: i32, expires_in: Duration) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "a@b.co".to_string(),
            password_hash: String::new(),
            full_name: "A".to_string(),
            phone: None,
            role: UserRole::User,
            is_verified: false,
            verification_code_hash: Some(hash_secret(code)),
            verification_expires_at: Some(now + expires_in),
            verification_attempts: attempts,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn verification_code_outcomes() {
        let now = Utc::now();
        let user = pending_user("123456", 0, Duration::hours(1));
        assert_eq!(check_verification_code(&user, "123456", now), CodeCheck::Valid);
        assert_eq!(check_verification_code(&user, "654321", now), CodeCheck::Wrong);

        let expired = pending_user("123456", 0, Duration::minutes(-1));
        assert_eq!(check_verification_code(&expired, "123456", now), CodeCheck::Unavailable);

        let mut cleared = pending_user("123456", 0, Duration::hours(1));
        cleared.verification_code_hash = None;
        assert_eq!(check_verification_code(&cleared, "123456", now), CodeCheck::Unavailable);
    }

    #[test]
    fn exhausted_attempts_block_even_the_right_code() {
        let now = Utc::now();
        let last_try = pending_user("123456", MAX_VERIFICATION_ATTEMPTS - 1, Duration::hours(1));
        assert_eq!(check_verification_code(&last_try, "123456", now), CodeCheck::Valid);

        let spent = pending_user("123456", MAX_VERIFICATION_ATTEMPTS, Duration::hours(1));
        assert_eq!(check_verification_code(&spent, "123456", now), CodeCheck::Unavailable);
    }

    #[test]
    fn bearer_parsing() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer abc123"))), Some("abc123"));
        assert_eq!(bearer_token(&parts_with(Some("bearer  abc123 "))), Some("abc123"));
        assert_eq!(bearer_token(&parts_with(Some("Basic abc123"))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts_with(None)), None);
    }
}
