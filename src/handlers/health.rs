use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

pub async fn api_health_check(State(state): State<AppState>) -> Json<Value> {
    let db_status = match state.store.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!("⚠️ Store ping failed: {}", e);
            "disconnected"
        }
    };

    Json(json!({
        "status": "healthy",
        "database": db_status,
        "hybrid_percentage": state.settings.hybrid.percentage,
        "currency": state.settings.currency,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
