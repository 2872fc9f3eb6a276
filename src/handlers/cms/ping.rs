// handlers/cms/ping.rs - GET /api/v2/cms/:service_id/ping handler

use axum::extract::State;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult};

/// Round-trip `SELECT 1` through whichever pool the current service context routes to.
///
/// The service id comes from the request context (set from the path), not
/// from the path parameter, so this exercises the same lookup data handlers use.
pub async fn ping(State(state): State<AppState>) -> ApiResult<Value> {
    let route = state.resolver.try_resolve()?;

    route.pool.ping().await.map_err(|e| {
        tracing::warn!(tenant = %route.tenant_id, error = %e, "Routed ping failed");
        ApiError::bad_gateway(format!("Service database unreachable: {}", route.tenant_id))
    })?;

    Ok(ApiResponse::success(json!({
        "serviceId": route.requested,
        "routedTo": route.tenant_id,
        "tier": route.tier,
        "pool": route.pool.name(),
    })))
}
