// handlers/services/delete.rs - DELETE /api/v2/integrated-cms/services/:service_id handler

use axum::extract::{Path, State};
use serde_json::{json, Value};

use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult};

/// Unpublish and drain a dynamic service pool. The default tenant is refused with 403.
pub async fn delete(State(state): State<AppState>, Path(service_id): Path<String>) -> ApiResult<Value> {
    state.registry.remove(&service_id).await?;

    Ok(ApiResponse::success(json!({
        "serviceId": service_id,
        "removed": true,
    }))
    .with_message("Service data source removed"))
}
