// Ledger history, balance and withdrawals

use axum::extract::State;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::database::{BankAccountRepo, TransactionRepo};
use crate::error::{ApiError, ApiResult};
use crate::models::{Transaction, TransactionQuery, WithdrawRequest};
use crate::response::{ApiJson, ApiPath, ApiQuery, ApiResponse, PageQuery, Paginated};
use crate::services::ledger::{self, Balance};
use crate::AppState;

pub async fn list(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiQuery(page): ApiQuery<PageQuery>,
    ApiQuery(query): ApiQuery<TransactionQuery>,
) -> ApiResult<ApiResponse<Paginated<Transaction>>> {
    let (items, total) = TransactionRepo::list(
        &state.db,
        auth.id(),
        query.tx_type,
        query.status,
        page.limit(),
        page.offset(),
    )
    .await?;
    Ok(ApiResponse::ok(Paginated::new(items, &page, total)))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Transaction>> {
    let transaction = TransactionRepo::find(&state.db, auth.id(), id)
        .await?
        .ok_or(ApiError::NotFound("Transaction"))?;
    Ok(ApiResponse::ok(transaction))
}

pub async fn balance(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> ApiResult<ApiResponse<Balance>> {
    let balance = ledger::balance(&state.db, auth.id()).await?;
    Ok(ApiResponse::ok(balance))
}

pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(req): ApiJson<WithdrawRequest>,
) -> ApiResult<ApiResponse<Transaction>> {
    let account = match req.bank_account_id {
        Some(id) => BankAccountRepo::find(&state.db, auth.id(), id)
            .await?
            .ok_or(ApiError::NotFound("Bank account"))?,
        None => BankAccountRepo::find_default(&state.db, auth.id())
            .await?
            .ok_or_else(|| ApiError::bad_request("Link a bank account before withdrawing"))?,
    };

    let withdrawal = ledger::request_withdrawal(
        &state.db,
        auth.id(),
        req.amount,
        account.id,
        state.config.min_withdrawal_amount,
    )
    .await?;

    Ok(ApiResponse::created(withdrawal).with_message("Withdrawal is being processed"))
}

pub async fn cancel(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Transaction>> {
    let cancelled = TransactionRepo::cancel_pending_withdrawal(&state.db, auth.id(), id).await?;

    match cancelled {
        Some(transaction) => {
            info!("User {} cancelled withdrawal {}", auth.id(), id);
            Ok(ApiResponse::ok(transaction).with_message("Withdrawal cancelled"))
        }
        None => match TransactionRepo::find(&state.db, auth.id(), id).await? {
            Some(_) => Err(ApiError::bad_request(
                "Only pending withdrawals can be cancelled",
            )),
            None => Err(ApiError::NotFound("Transaction")),
        },
    }
}
