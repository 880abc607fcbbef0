// Linked bank accounts

use axum::extract::State;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::database::BankAccountRepo;
use crate::error::{ApiError, ApiResult};
use crate::models::{BankAccount, CreateBankAccountRequest, UpdateBankAccountRequest};
use crate::response::{ApiJson, ApiPath, ApiResponse};
use crate::validation::Validator;
use crate::AppState;

/// Last four digits of an account number, the only part we keep
fn last4(account_number: &str) -> String {
    let digits: Vec<char> = account_number.chars().filter(|c| c.is_ascii_digit()).collect();
    digits[digits.len().saturating_sub(4)..].iter().collect()
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> ApiResult<ApiResponse<Vec<BankAccount>>> {
    let accounts = BankAccountRepo::list(&state.db, auth.id()).await?;
    Ok(ApiResponse::ok(accounts))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(req): ApiJson<CreateBankAccountRequest>,
) -> ApiResult<ApiResponse<BankAccount>> {
    let mut v = Validator::new();
    v.length("bank_name", &req.bank_name, 1, 100)
        .length("account_holder", &req.account_holder, 1, 100)
        .digits("account_number", req.account_number.trim(), 4, 34);
    if let Some(routing) = &req.routing_number {
        v.digits("routing_number", routing.trim(), 5, 12);
    }
    v.finish()?;

    let account =
        BankAccountRepo::create(&state.db, auth.id(), &req, &last4(&req.account_number)).await?;
    info!("User {} linked bank account {}", auth.id(), account.id);
    Ok(ApiResponse::created(account))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<BankAccount>> {
    let account = BankAccountRepo::find(&state.db, auth.id(), id)
        .await?
        .ok_or(ApiError::NotFound("Bank account"))?;
    Ok(ApiResponse::ok(account))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateBankAccountRequest>,
) -> ApiResult<ApiResponse<BankAccount>> {
    let mut v = Validator::new();
    if let Some(name) = &req.bank_name {
        v.length("bank_name", name, 1, 100);
    }
    if let Some(holder) = &req.account_holder {
        v.length("account_holder", holder, 1, 100);
    }
    if let Some(routing) = &req.routing_number {
        v.digits("routing_number", routing.trim(), 5, 12);
    }
    v.finish()?;

    let account = BankAccountRepo::update(&state.db, auth.id(), id, &req)
        .await?
        .ok_or(ApiError::NotFound("Bank account"))?;
    Ok(ApiResponse::ok(account))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    if !BankAccountRepo::delete(&state.db, auth.id(), id).await? {
        return Err(ApiError::NotFound("Bank account"));
    }
    info!("User {} removed bank account {}", auth.id(), id);
    Ok(ApiResponse::message("Bank account removed"))
}

pub async fn set_default(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<BankAccount>> {
    let account = BankAccountRepo::set_default(&state.db, auth.id(), id)
        .await?
        .ok_or(ApiError::NotFound("Bank account"))?;
    Ok(ApiResponse::ok(account).with_message("Default bank account updated"))
}

#[cfg(test)]
mod tests {
    use super::last4;

    #[test]
    fn keeps_only_last_four_digits() {
        assert_eq!(last4("000123456789"), "6789");
        assert_eq!(last4("1234"), "1234");
        assert_eq!(last4("12"), "12");
    }
}
