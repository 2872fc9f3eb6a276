use tracing::{info, warn};

use super::connector::{PoolConnector, PoolSpec, SqlxConnector};
use super::env::{process_env, DataSourceVars};
use super::registry::{ConnectionPoolRegistry, RegistryError};
use super::routing::{RoutingResolver, StaticRoutes};
use crate::config::AppConfig;
use crate::context::DEFAULT_TENANT;

/// Registry and resolver wired together at startup.
pub struct Routing<C: PoolConnector> {
    pub registry: ConnectionPoolRegistry<C>,
    pub resolver: RoutingResolver<C>,
}

impl<C: PoolConnector> Clone for Routing<C> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

/// Build the production routing stack from configuration and the process environment.
pub async fn bootstrap(config: &AppConfig) -> Result<Routing<SqlxConnector>, RegistryError> {
    bootstrap_with(SqlxConnector::new(), config, process_env).await
}

/// Build the static tier, the registry and the resolver, then provision the
/// configured tenants.
///
/// Only the default tenant's pool is required. Static pools are built lazily,
/// so the process starts even if a legacy database is down; tenants missing
/// their variables are skipped with a warning.
pub async fn bootstrap_with<C, F>(connector: C, config: &AppConfig, lookup: F) -> Result<Routing<C>, RegistryError>
where
    C: PoolConnector,
    F: Fn(&str) -> Option<String>,
{
    let settings = config.registry_settings();

    let default_spec = PoolSpec::new(
        DEFAULT_TENANT,
        config.routing.default_url.clone(),
        config.routing.default_username.clone(),
        config.routing.default_password.clone(),
    )
    .with_settings(settings.default_pool.clone());
    let default_pool = connector.connect_lazy(&default_spec)?;
    info!(tenant = DEFAULT_TENANT, url = %default_spec.redacted_url(), "Configured default data source");

    let mut routes = StaticRoutes::new(default_pool);
    for tenant_id in &config.routing.static_tenants {
        if tenant_id == DEFAULT_TENANT {
            continue;
        }
        let Some(vars) = DataSourceVars::read(tenant_id, &lookup) else {
            warn!(tenant = %tenant_id, "Static data source not configured, skipping");
            continue;
        };

        let spec = PoolSpec::new(tenant_id.as_str(), vars.url, vars.username, vars.password)
            .with_settings(settings.tenant_pool.clone().with_overrides(tenant_id, &lookup));
        match connector.connect_lazy(&spec) {
            Ok(pool) => {
                info!(tenant = %tenant_id, url = %spec.redacted_url(), "Configured static data source");
                routes = routes.with_route(tenant_id.as_str(), pool);
            }
            Err(e) => warn!(tenant = %tenant_id, error = %e, "Failed to configure static data source"),
        }
    }

    let registry = ConnectionPoolRegistry::new(connector, settings);
    let resolver = RoutingResolver::new(registry.clone(), routes).with_mode(config.routing_mode());

    for tenant_id in &config.routing.auto_provision_tenants {
        match registry.try_auto_provision_with(tenant_id, &lookup).await {
            Ok(true) => {}
            Ok(false) => warn!(tenant = %tenant_id, "Auto-provision skipped, environment incomplete"),
            Err(e) => warn!(tenant = %tenant_id, error = %e, "Auto-provision failed"),
        }
    }

    info!(
        static_tenants = ?resolver.static_routes().tenant_ids(),
        dynamic_tenants = ?registry.tenant_ids(),
        mode = ?resolver.mode(),
        "Data source routing initialized"
    );

    Ok(Routing { registry, resolver })
}
