use axum::{extract::Request, middleware::Next, response::Response};

use crate::context::{RequestContext, DEFAULT_TENANT};

const INTEGRATED_PREFIX: &str = "/api/v2/integrated-cms/";
const SERVICE_PREFIX: &str = "/api/v2/cms/";

/// Service id implied by a request path.
///
/// `/api/v2/integrated-cms/...` targets the default tenant and
/// `/api/v2/cms/{id}/...` targets `id`. Anything else carries no service id.
pub fn service_id_for_path(path: &str) -> Option<&str> {
    if path.starts_with(INTEGRATED_PREFIX) {
        return Some(DEFAULT_TENANT);
    }

    let rest = path.strip_prefix(SERVICE_PREFIX)?;
    let (service_id, _) = rest.split_once('/')?;
    (!service_id.is_empty()).then_some(service_id)
}

/// Runs every request in its own service context scope.
///
/// The scope ends with the response future, so the value is gone whether the
/// handler succeeded, failed or was cancelled.
pub async fn service_context_middleware(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let method = request.method().clone();

    RequestContext::scope(async move {
        match service_id_for_path(&path) {
            Some(service_id) => {
                RequestContext::set(service_id);
                tracing::debug!(tenant = %service_id, %method, %path, "Service context set");
            }
            None if path.starts_with("/api/v2/") => {
                tracing::warn!(%method, %path, "v2 API path does not match expected patterns");
            }
            None => {}
        }

        next.run(request).await
    })
    .await
}
