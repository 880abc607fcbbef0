// Funding Backend Server
// REST API + background jobs (withdrawal settlement, subscription renewal)

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use funding_backend::config::Config;
use funding_backend::database::Database;
use funding_backend::jobs::JobRunner;
use funding_backend::{router, AppState};

const DEFAULT_LOG_FILTER: &str = "funding_backend=info,sqlx=warn,tower_http=info";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(filter);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();
    info!("Starting Funding Backend Server");

    let config = Config::from_env()?;
    config.log_summary();

    let db = Database::init(&config.database_url, config.db_max_connections).await?;
    let server_port = config.server_port;
    let state = Arc::new(AppState::new(db, config)?);

    // Background jobs
    let jobs = JobRunner::new(state.clone());
    tokio::spawn(async move {
        jobs.run().await;
        error!("Background jobs stopped");
    });

    let app = router(state);

    let addr = format!("0.0.0.0:{}", server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Funding Backend listening on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}
