// handlers/services/show.rs - GET /api/v2/integrated-cms/services/:service_id handler

use axum::extract::{Path, State};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult};

pub async fn show(State(state): State<AppState>, Path(service_id): Path<String>) -> ApiResult<Value> {
    let info = state
        .registry
        .describe(&service_id)
        .ok_or_else(|| ApiError::not_found(format!("Service not found: {}", service_id)))?;

    Ok(ApiResponse::success(json!({
        "serviceId": service_id,
        "status": info.pool,
        "exists": true,
        "detail": info,
    })))
}
