use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::connector::PoolConnector;
use super::registry::ConnectionPoolRegistry;
use crate::context::{RequestContext, DEFAULT_TENANT};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("No data source configured for tenant: {0}")]
    UnknownTenant(String),
}

/// Pools configured at startup. Immutable after construction and always
/// holds an entry for [`DEFAULT_TENANT`].
#[derive(Debug, Clone)]
pub struct StaticRoutes<P> {
    routes: HashMap<String, P>,
}

impl<P: Clone> StaticRoutes<P> {
    pub fn new(default_pool: P) -> Self {
        let mut routes = HashMap::new();
        routes.insert(DEFAULT_TENANT.to_string(), default_pool);
        Self { routes }
    }

    /// Add a legacy tenant route. The default tenant's pool cannot be replaced.
    pub fn with_route(mut self, tenant_id: impl Into<String>, pool: P) -> Self {
        let tenant_id = tenant_id.into();
        if tenant_id != DEFAULT_TENANT {
            self.routes.insert(tenant_id, pool);
        }
        self
    }

    pub fn get(&self, tenant_id: &str) -> Option<&P> {
        self.routes.get(tenant_id)
    }

    pub fn default_pool(&self) -> &P {
        // present by construction
        &self.routes[DEFAULT_TENANT]
    }

    pub fn tenant_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.routes.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &P)> {
        self.routes.iter()
    }
}

/// Which tier satisfied a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteTier {
    Dynamic,
    Static,
    Fallback,
}

/// Behavior for ids that are in neither tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RoutingMode {
    /// Route to the default tenant's pool.
    #[default]
    Fallback,
    /// `try_resolve` reports `UnknownTenant`; `resolve` still falls back.
    Strict,
}

#[derive(Debug, Clone)]
pub struct ResolvedPool<P> {
    /// Id the caller asked for, after trimming. Blank requests become the default tenant.
    pub requested: String,
    /// Tenant whose pool was returned.
    pub tenant_id: String,
    pub tier: RouteTier,
    pub pool: P,
}

/// Picks a pool for the current unit of work.
///
/// Dynamic entries win over static ones; anything else falls back to the
/// default tenant. Every step is an in-memory read.
pub struct RoutingResolver<C: PoolConnector> {
    registry: ConnectionPoolRegistry<C>,
    static_routes: Arc<StaticRoutes<C::Pool>>,
    mode: RoutingMode,
}

impl<C: PoolConnector> Clone for RoutingResolver<C> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            static_routes: Arc::clone(&self.static_routes),
            mode: self.mode,
        }
    }
}

impl<C: PoolConnector> RoutingResolver<C> {
    pub fn new(registry: ConnectionPoolRegistry<C>, static_routes: StaticRoutes<C::Pool>) -> Self {
        Self {
            registry,
            static_routes: Arc::new(static_routes),
            mode: RoutingMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: RoutingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> RoutingMode {
        self.mode
    }

    pub fn registry(&self) -> &ConnectionPoolRegistry<C> {
        &self.registry
    }

    pub fn static_routes(&self) -> &StaticRoutes<C::Pool> {
        &self.static_routes
    }

    /// Pool for the current context. Never fails.
    pub fn resolve(&self) -> ResolvedPool<C::Pool> {
        self.resolve_for(&RequestContext::current_or_default())
    }

    /// Shorthand for `resolve().pool`.
    pub fn pool(&self) -> C::Pool {
        self.resolve().pool
    }

    /// Pool for an explicit tenant id, without reading the context.
    pub fn resolve_for(&self, tenant_id: &str) -> ResolvedPool<C::Pool> {
        match self.lookup(tenant_id) {
            Ok(resolved) => resolved,
            Err(requested) => {
                warn!(tenant = %requested, "Unknown service id, routing to default data source");
                ResolvedPool {
                    requested,
                    tenant_id: DEFAULT_TENANT.to_string(),
                    tier: RouteTier::Fallback,
                    pool: self.static_routes.default_pool().clone(),
                }
            }
        }
    }

    /// Like [`Self::resolve`], but fails for unknown ids in strict mode.
    pub fn try_resolve(&self) -> Result<ResolvedPool<C::Pool>, RoutingError> {
        self.try_resolve_for(&RequestContext::current_or_default())
    }

    pub fn try_resolve_for(&self, tenant_id: &str) -> Result<ResolvedPool<C::Pool>, RoutingError> {
        match self.mode {
            RoutingMode::Fallback => Ok(self.resolve_for(tenant_id)),
            RoutingMode::Strict => self.lookup(tenant_id).map_err(RoutingError::UnknownTenant),
        }
    }

    /// Dynamic tier, then static tier. `Err` carries the normalized id.
    fn lookup(&self, tenant_id: &str) -> Result<ResolvedPool<C::Pool>, String> {
        let key = match tenant_id.trim() {
            "" => DEFAULT_TENANT,
            trimmed => trimmed,
        };

        let found = self
            .registry
            .lookup(key)
            .map(|pool| (RouteTier::Dynamic, pool))
            .or_else(|| {
                self.static_routes
                    .get(key)
                    .map(|pool| (RouteTier::Static, pool.clone()))
            });

        match found {
            Some((tier, pool)) => {
                debug!(tenant = %key, ?tier, "Routing to data source");
                Ok(ResolvedPool {
                    requested: key.to_string(),
                    tenant_id: key.to_string(),
                    tier,
                    pool,
                })
            }
            None => Err(key.to_string()),
        }
    }
}
