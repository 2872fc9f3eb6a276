use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::database::env::process_env;
use crate::database::{Password, PoolSettings, RegistrySettings, RoutingMode};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub routing: RoutingConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Default pool bounds. Per-tenant `<TENANT>_DB_*` variables override these
/// at provisioning time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub default_pool: PoolSettings,
    pub tenant_pool: PoolSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub default_url: String,
    pub default_username: String,
    pub default_password: Password,
    /// Legacy tenants wired into the static tier at startup
    pub static_tenants: Vec<String>,
    /// Tenants provisioned into the registry from the environment at startup
    pub auto_provision_tenants: Vec<String>,
    pub strict: bool,
    pub provision_timeout_ms: u64,
    pub close_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
    pub enable_cors: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(process_env)
    }

    /// Build from an explicit variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_overrides(lookup)
    }

    fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Default tenant data source (same names the legacy deployment uses)
        if let Some(v) = lookup("INTEGRATED_CMS_DATASOURCE_URL") {
            self.routing.default_url = v;
        }
        if let Some(v) = lookup("INTEGRATED_DB_USERNAME") {
            self.routing.default_username = v;
        }
        if let Some(v) = lookup("INTEGRATED_DB_PASSWORD") {
            self.routing.default_password = Password::new(v);
        }

        // Routing overrides
        if let Some(v) = lookup("ROUTING_STATIC_TENANTS") {
            self.routing.static_tenants = split_list(&v);
        }
        if let Some(v) = lookup("ROUTING_AUTO_PROVISION_TENANTS") {
            self.routing.auto_provision_tenants = split_list(&v);
        }
        if let Some(v) = lookup("ROUTING_STRICT") {
            self.routing.strict = v.parse().unwrap_or(self.routing.strict);
        }
        if let Some(v) = lookup("ROUTING_PROVISION_TIMEOUT_MS") {
            self.routing.provision_timeout_ms = v.parse().unwrap_or(self.routing.provision_timeout_ms);
        }
        if let Some(v) = lookup("ROUTING_CLOSE_TIMEOUT_MS") {
            self.routing.close_timeout_ms = v.parse().unwrap_or(self.routing.close_timeout_ms);
        }

        // Database overrides apply to non-default tenant pools
        let pool = &mut self.database.tenant_pool;
        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            pool.max_size = v.parse().unwrap_or(pool.max_size);
        }
        if let Some(v) = lookup("DATABASE_MIN_IDLE") {
            pool.min_idle = v.parse().unwrap_or(pool.min_idle);
        }
        if let Some(v) = lookup("DATABASE_CONNECTION_TIMEOUT_MS") {
            pool.connection_timeout_ms = v.parse().unwrap_or(pool.connection_timeout_ms);
        }
        if let Some(v) = lookup("DATABASE_IDLE_TIMEOUT_MS") {
            pool.idle_timeout_ms = v.parse().unwrap_or(pool.idle_timeout_ms);
        }
        if let Some(v) = lookup("DATABASE_MAX_LIFETIME_MS") {
            pool.max_lifetime_ms = v.parse().unwrap_or(pool.max_lifetime_ms);
        }
        if let Some(v) = lookup("DATABASE_LEAK_DETECTION_MS") {
            pool.leak_detection_ms = v.parse().unwrap_or(pool.leak_detection_ms);
        }

        // The default tenant keeps its larger bounds but follows the shared timeouts
        self.database.default_pool.connection_timeout_ms = pool.connection_timeout_ms;
        self.database.default_pool.idle_timeout_ms = pool.idle_timeout_ms;
        self.database.default_pool.max_lifetime_ms = pool.max_lifetime_ms;
        self.database.default_pool.leak_detection_ms = pool.leak_detection_ms;
        self.database.default_pool = self
            .database
            .default_pool
            .clone()
            .with_overrides(crate::context::DEFAULT_TENANT, &lookup);

        // API overrides
        if let Some(v) = lookup("CMS_API_PORT").or_else(|| lookup("PORT")) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Some(v) = lookup("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Some(v) = lookup("SECURITY_ENABLE_CORS") {
            self.api.enable_cors = v.parse().unwrap_or(self.api.enable_cors);
        }

        self
    }

    pub fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            provision_timeout: Duration::from_millis(self.routing.provision_timeout_ms),
            close_timeout: Duration::from_millis(self.routing.close_timeout_ms),
            default_pool: self.database.default_pool.clone(),
            tenant_pool: self.database.tenant_pool.clone(),
        }
    }

    pub fn routing_mode(&self) -> RoutingMode {
        if self.routing.strict {
            RoutingMode::Strict
        } else {
            RoutingMode::Fallback
        }
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                default_pool: PoolSettings::default_tenant(),
                tenant_pool: PoolSettings::tenant(),
            },
            routing: RoutingConfig {
                default_url: "mysql://localhost:3306/integrated_cms".to_string(),
                default_username: "root".to_string(),
                default_password: Password::default(),
                static_tenants: vec!["douzone".to_string()],
                auto_provision_tenants: Vec::new(),
                strict: false,
                provision_timeout_ms: 30_000,
                close_timeout_ms: 30_000,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                enable_cors: true,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                default_pool: PoolSettings::default_tenant(),
                tenant_pool: PoolSettings::tenant(),
            },
            routing: RoutingConfig {
                default_url: "mysql://db:3306/integrated_cms".to_string(),
                default_username: "integrated".to_string(),
                default_password: Password::default(),
                static_tenants: vec!["douzone".to_string()],
                auto_provision_tenants: Vec::new(),
                strict: false,
                provision_timeout_ms: 30_000,
                close_timeout_ms: 30_000,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                enable_cors: true,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                default_pool: PoolSettings::default_tenant(),
                tenant_pool: PoolSettings::tenant(),
            },
            routing: RoutingConfig {
                default_url: "mysql://db:3306/integrated_cms".to_string(),
                default_username: "integrated".to_string(),
                default_password: Password::default(),
                static_tenants: vec!["douzone".to_string()],
                auto_provision_tenants: Vec::new(),
                strict: false,
                provision_timeout_ms: 15_000,
                close_timeout_ms: 60_000,
            },
            api: ApiConfig {
                port: 8080,
                enable_request_logging: false,
                enable_cors: false,
            },
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
