// handlers/services/list.rs - GET /api/v2/integrated-cms/services handler

use axum::extract::State;
use serde_json::{json, Value};

use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult};

/// Status of every dynamic service plus the static routes configured at startup
pub async fn list(State(state): State<AppState>) -> ApiResult<Value> {
    let services = state.registry.list_all();

    Ok(ApiResponse::success(json!({
        "services": services,
        "totalCount": services.len(),
        "staticServices": state.resolver.static_routes().tenant_ids(),
        "timestamp": chrono::Utc::now().timestamp_millis(),
    })))
}
