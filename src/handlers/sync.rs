// Incremental pull for offline clients

use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::database::{
    BankAccountRepo, Database, FundingRepo, NotificationRepo, PaymentMethodRepo, TransactionRepo,
};
use crate::error::ApiResult;
use crate::models::{BankAccount, Funding, Notification, PaymentMethod, Transaction};
use crate::response::{ApiQuery, ApiResponse};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChangesQuery {
    pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct Changes {
    /// Pass back as `since` on the next pull. Consecutive pulls can overlap,
    /// so clients upsert rows by id.
    pub server_time: DateTime<Utc>,
    pub fundings: Vec<Funding>,
    pub transactions: Vec<Transaction>,
    pub notifications: Vec<Notification>,
    pub bank_accounts: Vec<BankAccount>,
    pub payment_methods: Vec<PaymentMethod>,
}

/// Rows updated at or after `since`, or everything when it is absent
pub async fn changes(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<ChangesQuery>,
) -> ApiResult<ApiResponse<Changes>> {
    let server_time = Database::sync_cursor(&state.db).await?;
    let (db, user, since) = (&state.db, auth.id(), query.since);

    Ok(ApiResponse::ok(Changes {
        server_time,
        fundings: FundingRepo::changed_since(db, user, since).await?,
        transactions: TransactionRepo::changed_since(db, user, since).await?,
        notifications: NotificationRepo::changed_since(db, user, since).await?,
        bank_accounts: BankAccountRepo::changed_since(db, user, since).await?,
        payment_methods: PaymentMethodRepo::changed_since(db, user, since).await?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn since_parses_rfc3339() {
        let query: ChangesQuery =
            serde_json::from_str(r#"{"since": "2025-03-01T12:00:00+02:00"}"#).unwrap();
        assert_eq!(query.since.unwrap().to_rfc3339(), "2025-03-01T10:00:00+00:00");

        let query: ChangesQuery = serde_json::from_str("{}").unwrap();
        assert!(query.since.is_none());
    }
}
