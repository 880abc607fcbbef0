// Storage invariants checked against a real Postgres. Each test gets a fresh
// database from `sqlx::test`; run with `cargo test -- --ignored` and
// DATABASE_URL pointing at a server the tests may create databases on.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use funding_backend::auth::{hash_secret, MAX_VERIFICATION_ATTEMPTS};
use funding_backend::database::{
    BankAccountRepo, Database, FundingRepo, NewSubscription, PaymentMethodRepo, PlatformRepo,
    SubscriptionRepo, TransactionRepo, UserRepo,
};
use funding_backend::error::ApiError;
use funding_backend::models::{
    CreateBankAccountRequest, CreateFundingRequest, CreatePaymentMethodRequest,
    CreatePlanRequest, CreatePlatformRequest, FundingStatus, NewTransaction, PaymentMethodKind,
    PlatformCategory, SubscriptionStatus, TransactionStatus, TransactionType,
};
use funding_backend::services::{fundings, ledger, subscriptions, PaymentGateway, PushClient};

async fn user(pool: &PgPool) -> Uuid {
    let email = format!("{}@example.com", Uuid::new_v4().simple());
    UserRepo::create(pool, &email, "not-a-real-hash", "Test User")
        .await
        .unwrap()
        .id
}

async fn bank_account(pool: &PgPool, user_id: Uuid, is_default: bool) -> Uuid {
    let req = CreateBankAccountRequest {
        bank_name: "First Bank".to_string(),
        account_holder: "Test User".to_string(),
        account_number: "000123456789".to_string(),
        routing_number: None,
        is_default,
    };
    BankAccountRepo::create(pool, user_id, &req, "6789").await.unwrap().id
}

async fn card(pool: &PgPool, user_id: Uuid, provider: &str) -> Uuid {
    let req = CreatePaymentMethodRequest {
        kind: PaymentMethodKind::Card,
        provider: provider.to_string(),
        last4: "4242".to_string(),
        expiry_month: Some(12),
        expiry_year: Some(2099),
        is_default: false,
    };
    PaymentMethodRepo::create(pool, user_id, &req).await.unwrap().id
}

async fn credit_profit(pool: &PgPool, user_id: Uuid, amount: i64) {
    let entry = NewTransaction::new(
        user_id,
        TransactionType::Profit,
        TransactionStatus::Completed,
        amount,
    );
    TransactionRepo::insert(pool, &entry).await.unwrap();
}

fn offline_push() -> PushClient {
    PushClient::new(
        String::new(),
        "http://127.0.0.1:1/send".to_string(),
        std::time::Duration::from_secs(1),
    )
    .unwrap()
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires Postgres (DATABASE_URL)"]
async fn concurrent_withdrawals_cannot_overdraw(pool: PgPool) {
    let user_id = user(&pool).await;
    let account = bank_account(&pool, user_id, true).await;
    credit_profit(&pool, user_id, 10_000).await;

    let (first, second) = tokio::join!(
        ledger::request_withdrawal(&pool, user_id, 8_000, account, 1_000),
        ledger::request_withdrawal(&pool, user_id, 8_000, account, 1_000),
    );

    assert_eq!(
        [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(),
        1
    );
    let refused = if first.is_err() { first } else { second };
    assert!(matches!(refused, Err(ApiError::BadRequest(ref m)) if m.contains("Insufficient")));

    let balance = ledger::balance(&pool, user_id).await.unwrap();
    assert_eq!(balance.pending_withdrawals, 8_000);
    assert_eq!(balance.available, 2_000);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires Postgres (DATABASE_URL)"]
async fn settlement_leaves_cancelled_withdrawals_alone(pool: PgPool) {
    let user_id = user(&pool).await;
    let account = bank_account(&pool, user_id, true).await;
    credit_profit(&pool, user_id, 10_000).await;

    let kept = ledger::request_withdrawal(&pool, user_id, 2_000, account, 1_000)
        .await
        .unwrap();
    let dropped = ledger::request_withdrawal(&pool, user_id, 3_000, account, 1_000)
        .await
        .unwrap();
    TransactionRepo::cancel_pending_withdrawal(&pool, user_id, dropped.id)
        .await
        .unwrap()
        .unwrap();

    let settled = TransactionRepo::settle_withdrawals(&pool, Utc::now() + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(settled.len(), 1);
    assert_eq!(settled[0].id, kept.id);

    let dropped = TransactionRepo::find(&pool, user_id, dropped.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(dropped.status, TransactionStatus::Cancelled);

    let balance = ledger::balance(&pool, user_id).await.unwrap();
    assert_eq!(balance.completed_withdrawals, 2_000);
    assert_eq!(balance.available, 8_000);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires Postgres (DATABASE_URL)"]
async fn one_default_bank_account_at_a_time(pool: PgPool) {
    let user_id = user(&pool).await;
    let first = bank_account(&pool, user_id, false).await;
    let second = bank_account(&pool, user_id, false).await;

    let defaults = |accounts: Vec<funding_backend::models::BankAccount>| {
        accounts
            .into_iter()
            .filter(|a| a.is_default)
            .map(|a| a.id)
            .collect::<Vec<_>>()
    };

    assert_eq!(defaults(BankAccountRepo::list(&pool, user_id).await.unwrap()), vec![first]);

    BankAccountRepo::set_default(&pool, user_id, second)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(defaults(BankAccountRepo::list(&pool, user_id).await.unwrap()), vec![second]);

    assert!(BankAccountRepo::delete(&pool, user_id, second).await.unwrap());
    assert_eq!(defaults(BankAccountRepo::list(&pool, user_id).await.unwrap()), vec![first]);

    let err = sqlx::query(
        "INSERT INTO bank_accounts (id, user_id, bank_name, account_holder, account_last4, is_default) \
         VALUES ($1, $2, 'Other Bank', 'Test User', '1111', TRUE)",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .execute(&pool)
    .await
    .unwrap_err();
    assert!(funding_backend::database::is_unique_violation(&err));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires Postgres (DATABASE_URL)"]
async fn deleting_the_default_card_promotes_the_latest(pool: PgPool) {
    let user_id = user(&pool).await;
    let first = card(&pool, user_id, "visa").await;
    let second = card(&pool, user_id, "mastercard").await;
    let third = card(&pool, user_id, "amex").await;

    assert!(PaymentMethodRepo::find_default(&pool, user_id)
        .await
        .unwrap()
        .is_some_and(|m| m.id == first));

    assert!(PaymentMethodRepo::delete(&pool, user_id, first).await.unwrap());
    let promoted = PaymentMethodRepo::find_default(&pool, user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(promoted.id, third);

    let methods = PaymentMethodRepo::list(&pool, user_id).await.unwrap();
    assert_eq!(methods.iter().filter(|m| m.is_default).count(), 1);
    assert!(methods.iter().any(|m| m.id == second && !m.is_default));
}

async fn due_subscription(pool: &PgPool, user_id: Uuid, method: Uuid, auto_renew: bool) -> Uuid {
    let plan = SubscriptionRepo::create_plan(
        pool,
        &CreatePlanRequest {
            name: "Pro".to_string(),
            price: 1_999,
            interval_days: 30,
            features: vec!["advice".to_string()],
        },
    )
    .await
    .unwrap();

    let ended = Utc::now() - Duration::hours(1);
    SubscriptionRepo::insert(
        pool,
        &NewSubscription {
            user_id,
            plan_id: plan.id,
            payment_method_id: Some(method),
            previous_subscription_id: None,
            auto_renew,
            start_date: ended - Duration::days(30),
            end_date: ended,
        },
    )
    .await
    .unwrap()
    .id
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires Postgres (DATABASE_URL)"]
async fn renewal_chains_a_new_period(pool: PgPool) {
    let user_id = user(&pool).await;
    let method = card(&pool, user_id, "visa").await;
    let old = due_subscription(&pool, user_id, method, true).await;

    let summary = subscriptions::process_due(&pool, &PaymentGateway::default(), &offline_push(), Utc::now())
        .await
        .unwrap();
    assert_eq!(summary.renewed, 1);

    let old = SubscriptionRepo::find(&pool, user_id, old).await.unwrap().unwrap();
    assert_eq!(old.status, SubscriptionStatus::Renewed);

    let current = SubscriptionRepo::find_active(&pool, user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.previous_subscription_id, Some(old.id));
    assert_eq!(current.start_date, old.end_date);

    let again = subscriptions::process_due(&pool, &PaymentGateway::default(), &offline_push(), Utc::now())
        .await
        .unwrap();
    assert_eq!(again, subscriptions::RenewalSummary::default());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires Postgres (DATABASE_URL)"]
async fn auto_renew_switched_off_expires_without_charging(pool: PgPool) {
    let user_id = user(&pool).await;
    let method = card(&pool, user_id, "visa").await;
    let id = due_subscription(&pool, user_id, method, true).await;

    SubscriptionRepo::set_auto_renew(&pool, user_id, id, false)
        .await
        .unwrap()
        .unwrap();

    let summary = subscriptions::process_due(&pool, &PaymentGateway::default(), &offline_push(), Utc::now())
        .await
        .unwrap();
    assert_eq!(summary.expired, 1);
    assert_eq!(summary.renewed, 0);

    let closed = SubscriptionRepo::find(&pool, user_id, id).await.unwrap().unwrap();
    assert_eq!(closed.status, SubscriptionStatus::Expired);
    assert!(SubscriptionRepo::find_active(&pool, user_id).await.unwrap().is_none());

    let charges: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM transactions WHERE user_id = $1 AND tx_type = 'SUBSCRIPTION'",
    )
    .bind(user_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(charges, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires Postgres (DATABASE_URL)"]
async fn closed_funding_terms_are_frozen(pool: PgPool) {
    let user_id = user(&pool).await;
    let platform = PlatformRepo::create(
        &pool,
        &CreatePlatformRequest {
            name: "LendCo".to_string(),
            category: PlatformCategory::P2pLending,
            description: None,
            website_url: None,
            min_investment: 5_000,
            expected_return_pct: Some(8.0),
        },
    )
    .await
    .unwrap();

    let funding = fundings::create(
        &pool,
        user_id,
        &CreateFundingRequest {
            platform_id: platform.id,
            amount: 10_000,
            profit_share: 80,
        },
    )
    .await
    .unwrap();

    let below = fundings::update_terms(&pool, user_id, funding.id, Some(1_000), None).await;
    assert!(matches!(below, Err(ApiError::BadRequest(ref m)) if m.contains("Minimum")));

    let raised = fundings::update_terms(&pool, user_id, funding.id, Some(12_000), Some(70))
        .await
        .unwrap();
    assert_eq!((raised.amount, raised.profit_share), (12_000, 70));

    fundings::change_status(&pool, user_id, funding.id, FundingStatus::Completed)
        .await
        .unwrap();
    let frozen = fundings::update_terms(&pool, user_id, funding.id, Some(20_000), None).await;
    assert!(matches!(frozen, Err(ApiError::BadRequest(_))));

    let stored = FundingRepo::find(&pool, user_id, funding.id).await.unwrap().unwrap();
    assert_eq!(stored.amount, 12_000);
    assert_eq!(stored.status, FundingStatus::Completed);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires Postgres (DATABASE_URL)"]
async fn second_active_funding_on_a_platform_is_rejected_by_the_index(pool: PgPool) {
    let user_id = user(&pool).await;
    let platform = PlatformRepo::create(
        &pool,
        &CreatePlatformRequest {
            name: "AdNet".to_string(),
            category: PlatformCategory::Ads,
            description: None,
            website_url: None,
            min_investment: 0,
            expected_return_pct: None,
        },
    )
    .await
    .unwrap();

    FundingRepo::insert(&pool, user_id, platform.id, 1_000, 50).await.unwrap();
    let err = FundingRepo::insert(&pool, user_id, platform.id, 2_000, 50)
        .await
        .unwrap_err();
    assert!(funding_backend::database::is_unique_violation(&err));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires Postgres (DATABASE_URL)"]
async fn wrong_codes_burn_the_verification_code(pool: PgPool) {
    let user_id = user(&pool).await;
    UserRepo::set_verification_code(
        &pool,
        user_id,
        &hash_secret("123456"),
        Utc::now() + Duration::hours(1),
    )
    .await
    .unwrap();

    for expected in 1..MAX_VERIFICATION_ATTEMPTS {
        let attempts =
            UserRepo::record_failed_verification(&pool, user_id, MAX_VERIFICATION_ATTEMPTS)
                .await
                .unwrap();
        assert_eq!(attempts, expected);
        let user = UserRepo::find_by_id(&pool, user_id).await.unwrap().unwrap();
        assert!(user.verification_code_hash.is_some());
    }

    UserRepo::record_failed_verification(&pool, user_id, MAX_VERIFICATION_ATTEMPTS)
        .await
        .unwrap();
    let user = UserRepo::find_by_id(&pool, user_id).await.unwrap().unwrap();
    assert!(user.verification_code_hash.is_none());
    assert!(user.verification_expires_at.is_none());

    UserRepo::set_verification_code(
        &pool,
        user_id,
        &hash_secret("654321"),
        Utc::now() + Duration::hours(1),
    )
    .await
    .unwrap();
    let user = UserRepo::find_by_id(&pool, user_id).await.unwrap().unwrap();
    assert_eq!(user.verification_attempts, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires Postgres (DATABASE_URL)"]
async fn sync_cursor_never_runs_ahead_of_an_open_write(pool: PgPool) {
    let user_id = user(&pool).await;
    let mut open = pool.begin().await.unwrap();
    let started: chrono::DateTime<Utc> = sqlx::query_scalar("SELECT NOW()")
        .fetch_one(&mut *open)
        .await
        .unwrap();
    sqlx::query("UPDATE users SET full_name = 'Renamed' WHERE id = $1")
        .bind(user_id)
        .execute(&mut *open)
        .await
        .unwrap();

    let cursor = Database::sync_cursor(&pool).await.unwrap();
    assert!(cursor <= started);
    open.commit().await.unwrap();
}
