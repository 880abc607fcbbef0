// Liveness endpoint

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::database::Database;
use crate::AppState;

/// Always 200; the body reports whether the database answered
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let db_health = Database::ping(&state.db).await;

    Json(json!({
        "status": if db_health { "healthy" } else { "unhealthy" },
        "database": if db_health { "up" } else { "down" },
    }))
}
