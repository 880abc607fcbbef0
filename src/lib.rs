// Funding platform backend: REST API over Postgres plus background jobs

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod models;
pub mod response;
pub mod services;
pub mod validation;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use database::DbPool;
use error::ApiError;
use handlers::auth as session;
use handlers::{
    advice, analytics, bank_accounts, fundings, health, notifications, payment_methods,
    platforms, subscriptions, sync, transactions, users,
};
use services::{Advisor, PaymentGateway, PushClient};

/// Application state shared across handlers
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub push: PushClient,
    pub advisor: Advisor,
    pub gateway: PaymentGateway,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> anyhow::Result<Self> {
        let push = PushClient::new(
            config.push_server_key.clone(),
            config.push_api_url.clone(),
            config.http_timeout,
        )?;
        let advisor = Advisor::new(
            config.openrouter_api_key.clone(),
            config.advice_model.clone(),
            config.advice_api_url.clone(),
            config.http_timeout,
        )?;
        Ok(Self {
            db,
            config,
            push,
            advisor,
            gateway: PaymentGateway::default(),
        })
    }
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Route")
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Auth
        .route("/auth/register", post(session::register))
        .route("/auth/login", post(session::login))
        .route("/auth/logout", post(session::logout))
        .route("/auth/me", get(session::me))
        .route("/auth/verify-email", post(session::verify_email))
        .route("/auth/resend-verification", post(session::resend_verification))
        .route("/auth/change-password", post(session::change_password))
        // Users
        .route("/users/me", patch(users::update_me).delete(users::delete_me))
        // Bank accounts
        .route("/bank-accounts", get(bank_accounts::list).post(bank_accounts::create))
        .route(
            "/bank-accounts/:id",
            get(bank_accounts::get)
                .patch(bank_accounts::update)
                .delete(bank_accounts::delete),
        )
        .route("/bank-accounts/:id/default", post(bank_accounts::set_default))
        // Payment methods
        .route("/payment-methods", get(payment_methods::list).post(payment_methods::create))
        .route(
            "/payment-methods/:id",
            get(payment_methods::get)
                .patch(payment_methods::update)
                .delete(payment_methods::delete),
        )
        .route("/payment-methods/:id/default", post(payment_methods::set_default))
        // Platforms
        .route("/platforms", get(platforms::list).post(platforms::create))
        .route("/platforms/connections", get(platforms::connections))
        .route(
            "/platforms/:id",
            get(platforms::get)
                .patch(platforms::update)
                .delete(platforms::delete),
        )
        .route(
            "/platforms/:id/connect",
            post(platforms::connect).delete(platforms::disconnect),
        )
        // Fundings
        .route("/fundings", get(fundings::list).post(fundings::create))
        .route("/fundings/:id", get(fundings::get).patch(fundings::update))
        .route("/fundings/:id/status", post(fundings::change_status))
        // Transactions
        .route("/transactions", get(transactions::list))
        .route("/transactions/balance", get(transactions::balance))
        .route("/transactions/withdraw", post(transactions::withdraw))
        .route("/transactions/:id", get(transactions::get))
        .route("/transactions/:id/cancel", post(transactions::cancel))
        // Subscriptions
        .route("/subscriptions", get(subscriptions::history).post(subscriptions::subscribe))
        .route("/subscriptions/plans", get(subscriptions::plans))
        .route("/subscriptions/current", get(subscriptions::current))
        .route("/subscriptions/:id/cancel", post(subscriptions::cancel))
        .route("/subscriptions/:id/auto-renew", post(subscriptions::set_auto_renew))
        // Advice
        .route("/advice", get(advice::history).post(advice::ask))
        // Notifications
        .route("/notifications", get(notifications::list))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/devices", post(notifications::register_device))
        .route("/notifications/devices/:token", delete(notifications::remove_device))
        .route("/notifications/:id", delete(notifications::delete))
        .route("/notifications/:id/read", post(notifications::mark_read))
        // Analytics
        .route("/analytics/overview", get(analytics::overview))
        .route("/analytics/profit", get(analytics::profit))
        .route("/analytics/platforms", get(analytics::platforms))
        // Sync
        .route("/sync/changes", get(sync::changes))
        // Admin
        .route("/admin/users", get(users::list_users))
        .route("/admin/users/:id/role", patch(users::update_role))
        .route("/admin/fundings/:id/earnings", post(fundings::record_earnings))
        .route("/admin/subscriptions/plans", post(subscriptions::create_plan))
        .route("/admin/notifications/broadcast", post(notifications::broadcast))
        .route("/admin/analytics", get(analytics::admin))
}

/// Full HTTP surface with CORS and request tracing
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api_routes())
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
