// handlers/services/create.rs - POST /api/v2/integrated-cms/services/:service_id handler

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::database::connector::Password;
use crate::error::ApiError;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult};

/// Expected Input:
/// ```json
/// { "url": "jdbc:mariadb://db:3306/acme", "username": "acme", "password": "..." }
/// ```
///
/// Credentials may be omitted for drivers that do not use them (sqlite).
#[derive(Debug, Deserialize)]
pub struct CreateServiceRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: Password,
}

pub async fn create(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
    payload: Result<Json<CreateServiceRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(request) = payload?;

    if request.url.trim().is_empty() {
        let mut field_errors = HashMap::new();
        field_errors.insert("url".to_string(), "This field is required".to_string());
        return Err(ApiError::validation_error("Missing required fields", Some(field_errors)));
    }

    state
        .registry
        .create(&service_id, &request.url, &request.username, request.password)
        .await?;

    let info = state.registry.describe(&service_id);
    Ok(ApiResponse::created(json!({
        "serviceId": service_id,
        "created": true,
        "url": info.map(|i| i.connection_url),
    }))
    .with_message("Service data source created"))
}
