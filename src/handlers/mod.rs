// handlers/mod.rs - HTTP surface for the routing layer
//
// /api/v2/integrated-cms/services/*  service data source administration
// /api/v2/cms/:service_id/ping       routed connectivity check
// /health                            default data source health

pub mod cms;
pub mod health;
pub mod services;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};

use crate::database::{ConnectionPoolRegistry, Routing, RoutingResolver, SqlxConnector};
use crate::middleware::service_context_middleware;

/// Shared handler state. Clones are cheap handles to the same pools.
#[derive(Clone)]
pub struct AppState {
    pub registry: ConnectionPoolRegistry<SqlxConnector>,
    pub resolver: RoutingResolver<SqlxConnector>,
}

impl From<Routing<SqlxConnector>> for AppState {
    fn from(routing: Routing<SqlxConnector>) -> Self {
        Self {
            registry: routing.registry,
            resolver: routing.resolver,
        }
    }
}

/// Application routes with the service context applied to every request.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health::health))
        .merge(service_routes())
        .merge(cms_routes())
        .layer(middleware::from_fn(service_context_middleware))
        .with_state(state)
}

fn service_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v2/integrated-cms/services", get(services::list))
        .route(
            "/api/v2/integrated-cms/services/:service_id",
            get(services::show)
                .post(services::create)
                .delete(services::delete),
        )
        .route(
            "/api/v2/integrated-cms/services/:service_id/auto-detect",
            post(services::auto_detect),
        )
}

fn cms_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v2/integrated-cms/ping", get(cms::ping))
        .route("/api/v2/cms/:service_id/ping", get(cms::ping))
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "CMS Tenant Router",
            "version": version,
            "endpoints": {
                "health": "/health",
                "services": "/api/v2/integrated-cms/services[/:service_id]",
                "auto_detect": "/api/v2/integrated-cms/services/:service_id/auto-detect",
                "ping": "/api/v2/cms/:service_id/ping",
            }
        }
    }))
}
