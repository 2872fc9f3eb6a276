// handlers/services/auto_detect.rs - POST /api/v2/integrated-cms/services/:service_id/auto-detect handler

use axum::extract::{Path, State};
use serde_json::{json, Value};

use crate::database::env::{env_key, DATASOURCE_URL, DB_PASSWORD, DB_USERNAME};
use crate::error::ApiError;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult};

/// Provision a service from `<SERVICE>_DATASOURCE_URL`, `<SERVICE>_DB_USERNAME`
/// and `<SERVICE>_DB_PASSWORD`. Missing variables are a 400 naming what was expected.
pub async fn auto_detect(State(state): State<AppState>, Path(service_id): Path<String>) -> ApiResult<Value> {
    let created = state.registry.try_auto_provision_from_env(&service_id).await?;

    if !created {
        return Err(ApiError::bad_request(format!(
            "Service configuration not found in environment; expected {}, {} and {}",
            env_key(&service_id, DATASOURCE_URL),
            env_key(&service_id, DB_USERNAME),
            env_key(&service_id, DB_PASSWORD),
        )));
    }

    Ok(ApiResponse::success(json!({
        "serviceId": service_id,
        "created": true,
    }))
    .with_message("Service data source created from environment variables"))
}
