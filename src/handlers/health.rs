// handlers/health.rs - GET /health handler

use axum::{extract::State, http::StatusCode, response::{IntoResponse, Json}};
use serde_json::json;

use crate::context::DEFAULT_TENANT;
use crate::handlers::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    // same pool default-tenant queries are routed to, dynamic override included
    let route = state.resolver.resolve_for(DEFAULT_TENANT);

    match route.pool.ping().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": DEFAULT_TENANT,
                    "tier": route.tier,
                    "services": state.registry.len(),
                }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
