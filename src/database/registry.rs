use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::connector::{redact_url, Password, PoolConnector, PoolSettings, PoolSpec};
use super::env::{process_env, DataSourceVars};
use crate::context::DEFAULT_TENANT;

/// Errors from ConnectionPoolRegistry administrative operations
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Invalid tenant id: {0:?}")]
    InvalidTenantId(String),

    #[error("Tenant already registered: {0}")]
    DuplicateTenant(String),

    #[error("Tenant not found: {0}")]
    NotFound(String),

    #[error("Tenant '{0}' is protected and cannot be removed")]
    ProtectedTenant(String),

    #[error("Connection failed for tenant '{tenant}': {message}")]
    Connection { tenant: String, message: String },

    #[error("Registry is shutting down; cannot provision tenant '{0}'")]
    ShuttingDown(String),

    #[error("{operation} for tenant '{tenant}' timed out after {limit:?}")]
    Timeout {
        tenant: String,
        operation: &'static str,
        limit: Duration,
    },
}

impl RegistryError {
    /// `limit` is the pool's acquire timeout, reported when sqlx gives up waiting.
    pub(crate) fn from_sqlx(tenant: &str, limit: Duration, err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => RegistryError::Timeout {
                tenant: tenant.to_string(),
                operation: "connection acquire",
                limit,
            },
            other => RegistryError::Connection {
                tenant: tenant.to_string(),
                message: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoolStatus {
    Active,
    Closing,
}

impl PoolStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => PoolStatus::Active,
            _ => PoolStatus::Closing,
        }
    }
}

/// A provisioned tenant pool. Owned by the registry; only `status` changes
/// after construction.
pub struct PoolEntry<P> {
    tenant_id: String,
    connection_url: String,
    username: String,
    password: Password,
    pool: P,
    created_at: DateTime<Utc>,
    max_size: u32,
    status: AtomicU8,
}

impl<P> PoolEntry<P> {
    fn new(spec: &PoolSpec, pool: P) -> Self {
        Self {
            tenant_id: spec.tenant_id.clone(),
            connection_url: spec.url.clone(),
            username: spec.username.clone(),
            password: spec.password.clone(),
            pool,
            created_at: Utc::now(),
            max_size: spec.settings.max_size,
            status: AtomicU8::new(PoolStatus::Active as u8),
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn connection_url(&self) -> &str {
        &self.connection_url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &Password {
        &self.password
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn mark_closing(&self) {
        self.status.store(PoolStatus::Closing as u8, Ordering::Release);
    }
}

/// Serializable view of a pool entry for admin reporting. Never carries the password.
#[derive(Debug, Clone, Serialize)]
pub struct PoolEntryInfo {
    pub tenant_id: String,
    pub connection_url: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub max_size: u32,
    pub status: PoolStatus,
    pub pool: String,
}

/// Bounds for administrative operations and default pool settings.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub provision_timeout: Duration,
    pub close_timeout: Duration,
    pub default_pool: PoolSettings,
    pub tenant_pool: PoolSettings,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            provision_timeout: Duration::from_secs(30),
            close_timeout: Duration::from_secs(30),
            default_pool: PoolSettings::default_tenant(),
            tenant_pool: PoolSettings::tenant(),
        }
    }
}

type EntryMap<P> = HashMap<String, Arc<PoolEntry<P>>>;

/// Keys that block a new `create` while their pools are being built or drained.
struct WriterState<P> {
    provisioning: HashSet<String>,
    closing: HashMap<String, Arc<PoolEntry<P>>>,
    shutting_down: bool,
}

struct RegistryInner<C: PoolConnector> {
    connector: C,
    entries: ArcSwap<EntryMap<C::Pool>>,
    writer: Mutex<WriterState<C::Pool>>,
    settings: RegistrySettings,
}

/// Runtime-provisioned tenant pools.
///
/// Readers load an immutable snapshot of the entry map, so `lookup` never
/// waits on a writer. Writers serialize on a short mutex held only while the
/// map is swapped; connecting and closing happen outside it. Cloning the
/// registry clones a handle to the same pools.
pub struct ConnectionPoolRegistry<C: PoolConnector> {
    inner: Arc<RegistryInner<C>>,
}

impl<C: PoolConnector> Clone for ConnectionPoolRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: PoolConnector> ConnectionPoolRegistry<C> {
    pub fn new(connector: C, settings: RegistrySettings) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                connector,
                entries: ArcSwap::from_pointee(HashMap::new()),
                writer: Mutex::new(WriterState {
                    provisioning: HashSet::new(),
                    closing: HashMap::new(),
                    shutting_down: false,
                }),
                settings,
            }),
        }
    }

    pub fn connector(&self) -> &C {
        &self.inner.connector
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.inner.settings
    }

    /// Default pool settings for a tenant id.
    pub fn settings_for(&self, tenant_id: &str) -> PoolSettings {
        if tenant_id == DEFAULT_TENANT {
            self.inner.settings.default_pool.clone()
        } else {
            self.inner.settings.tenant_pool.clone()
        }
    }

    /// Provision a pool for `tenant_id` with the registry's default settings.
    pub async fn create(
        &self,
        tenant_id: &str,
        url: &str,
        username: &str,
        password: impl Into<Password>,
    ) -> Result<(), RegistryError> {
        let settings = self.settings_for(tenant_id);
        let spec = PoolSpec::new(tenant_id, url, username, password).with_settings(settings);
        self.create_with(spec).await
    }

    /// Provision a pool from a full spec.
    ///
    /// The pool must hand out a live connection before the entry becomes
    /// visible. Fails with `DuplicateTenant` while another entry for the same
    /// key exists, is being provisioned, or is still draining after removal.
    pub async fn create_with(&self, spec: PoolSpec) -> Result<(), RegistryError> {
        let tenant_id = spec.tenant_id.clone();
        if !is_valid_tenant_id(&tenant_id) {
            return Err(RegistryError::InvalidTenantId(tenant_id));
        }

        let reservation = self.reserve(&tenant_id)?;

        let limit = self.inner.settings.provision_timeout;
        let pool = match timeout(limit, self.inner.connector.connect(&spec)).await {
            Ok(Ok(pool)) => pool,
            Ok(Err(e)) => {
                warn!(tenant = %tenant_id, error = %e, "Failed to create data source");
                return Err(e);
            }
            Err(_) => {
                warn!(tenant = %tenant_id, ?limit, "Data source provisioning timed out");
                return Err(RegistryError::Timeout {
                    tenant: tenant_id,
                    operation: "pool provisioning",
                    limit,
                });
            }
        };

        if let Err(rejected) = reservation.publish(Arc::new(PoolEntry::new(&spec, pool))) {
            warn!(tenant = %tenant_id, "Registry closed during provisioning; discarding new pool");
            rejected.mark_closing();
            self.inner.connector.close(rejected.pool.clone()).await;
            return Err(RegistryError::ShuttingDown(tenant_id));
        }

        info!(
            tenant = %tenant_id,
            url = %spec.redacted_url(),
            max_size = spec.settings.max_size,
            "Created data source"
        );
        Ok(())
    }

    /// Unpublish and drain the pool for `tenant_id`.
    ///
    /// The entry disappears from lookups before its pool is closed; in-flight
    /// work keeps its connections until they are returned. The drain runs on
    /// its own task so it completes even if this call times out.
    pub async fn remove(&self, tenant_id: &str) -> Result<(), RegistryError> {
        if tenant_id == DEFAULT_TENANT {
            warn!(tenant = %tenant_id, "Refusing to remove default data source");
            return Err(RegistryError::ProtectedTenant(tenant_id.to_string()));
        }

        let entry = {
            let mut writer = self.inner.writer.lock();
            let current = self.inner.entries.load();
            let Some(entry) = current.get(tenant_id).cloned() else {
                return Err(RegistryError::NotFound(tenant_id.to_string()));
            };

            entry.mark_closing();
            let mut next = EntryMap::clone(&current);
            next.remove(tenant_id);
            self.inner.entries.store(Arc::new(next));
            writer.closing.insert(tenant_id.to_string(), Arc::clone(&entry));
            entry
        };

        let inner = Arc::clone(&self.inner);
        let key = tenant_id.to_string();
        let drain = tokio::spawn(async move {
            inner.connector.close(entry.pool.clone()).await;
            inner.writer.lock().closing.remove(&key);
            info!(tenant = %key, "Removed data source");
        });

        let limit = self.inner.settings.close_timeout;
        match timeout(limit, drain).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(join_error)) => {
                error!(tenant = %tenant_id, error = %join_error, "Data source close task failed");
                self.inner.writer.lock().closing.remove(tenant_id);
                Err(RegistryError::Connection {
                    tenant: tenant_id.to_string(),
                    message: format!("pool close failed: {join_error}"),
                })
            }
            Err(_) => {
                warn!(tenant = %tenant_id, ?limit, "Data source close still draining in background");
                Err(RegistryError::Timeout {
                    tenant: tenant_id.to_string(),
                    operation: "pool close",
                    limit,
                })
            }
        }
    }

    /// Active pool for `tenant_id`. Pure snapshot read, no I/O.
    pub fn lookup(&self, tenant_id: &str) -> Option<C::Pool> {
        self.inner
            .entries
            .load()
            .get(tenant_id)
            .filter(|entry| entry.status() == PoolStatus::Active)
            .map(|entry| entry.pool.clone())
    }

    pub fn contains(&self, tenant_id: &str) -> bool {
        self.lookup(tenant_id).is_some()
    }

    /// Sorted ids of all active entries.
    pub fn tenant_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.entries.load().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.inner.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Status line per tenant, including entries still draining.
    pub fn list_all(&self) -> BTreeMap<String, String> {
        let mut info: BTreeMap<String, String> = self
            .inner
            .entries
            .load()
            .iter()
            .map(|(id, entry)| (id.clone(), self.inner.connector.describe(&entry.pool)))
            .collect();

        for (id, entry) in self.inner.writer.lock().closing.iter() {
            let line = format!("Closing ({})", self.inner.connector.describe(&entry.pool));
            info.entry(id.clone()).or_insert(line);
        }
        info
    }

    /// Status line for one tenant.
    pub fn status(&self, tenant_id: &str) -> Option<String> {
        self.list_all().remove(tenant_id)
    }

    /// Detailed view of one active entry.
    pub fn describe(&self, tenant_id: &str) -> Option<PoolEntryInfo> {
        let entries = self.inner.entries.load();
        entries.get(tenant_id).map(|entry| self.entry_info(entry))
    }

    /// Detailed view of every active entry, sorted by tenant id.
    pub fn entries(&self) -> Vec<PoolEntryInfo> {
        let mut all: Vec<PoolEntryInfo> = self
            .inner
            .entries
            .load()
            .values()
            .map(|entry| self.entry_info(entry))
            .collect();
        all.sort_by(|a, b| a.tenant_id.cmp(&b.tenant_id));
        all
    }

    fn entry_info(&self, entry: &PoolEntry<C::Pool>) -> PoolEntryInfo {
        PoolEntryInfo {
            tenant_id: entry.tenant_id.clone(),
            connection_url: redact_url(&entry.connection_url),
            username: entry.username.clone(),
            created_at: entry.created_at,
            max_size: entry.max_size,
            status: entry.status(),
            pool: self.inner.connector.describe(&entry.pool),
        }
    }

    /// Provision `tenant_id` from `<TENANT>_DATASOURCE_URL`, `<TENANT>_DB_USERNAME`
    /// and `<TENANT>_DB_PASSWORD`.
    ///
    /// `Ok(false)` means no complete configuration was found. Once the
    /// variables are complete the call behaves exactly like `create`.
    pub async fn try_auto_provision_from_env(&self, tenant_id: &str) -> Result<bool, RegistryError> {
        self.try_auto_provision_with(tenant_id, process_env).await
    }

    /// Same as [`Self::try_auto_provision_from_env`] with an explicit variable source.
    pub async fn try_auto_provision_with<F>(&self, tenant_id: &str, lookup: F) -> Result<bool, RegistryError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(vars) = DataSourceVars::read(tenant_id, &lookup) else {
            debug!(tenant = %tenant_id, "Environment variables not found for service");
            return Ok(false);
        };

        let settings = self.settings_for(tenant_id).with_overrides(tenant_id, &lookup);
        let spec = PoolSpec::new(tenant_id, vars.url, vars.username, vars.password).with_settings(settings);
        self.create_with(spec).await?;

        info!(tenant = %tenant_id, "Service data source created from environment variables");
        Ok(true)
    }

    /// Unpublish and drain every pool (e.g., on shutdown).
    ///
    /// Waits for pools still draining after `remove` as well. Afterwards the
    /// registry refuses new entries, and a `create` that was already
    /// connecting closes its pool instead of publishing it.
    pub async fn close_all(&self) {
        let (published, draining): (Vec<_>, Vec<_>) = {
            let mut writer = self.inner.writer.lock();
            writer.shutting_down = true;
            let current = self.inner.entries.swap(Arc::new(HashMap::new()));
            (
                current.values().cloned().collect(),
                writer.closing.values().cloned().collect(),
            )
        };

        join_all(published.iter().chain(draining.iter()).map(|entry: &Arc<PoolEntry<C::Pool>>| {
            entry.mark_closing();
            self.inner.connector.close(entry.pool.clone())
        }))
        .await;

        for entry in &published {
            info!(tenant = %entry.tenant_id, "Closed data source");
        }
        if !draining.is_empty() {
            info!(count = draining.len(), "Finished draining removed data sources");
        }
    }

    fn reserve(&self, tenant_id: &str) -> Result<Reservation<'_, C>, RegistryError> {
        let mut writer = self.inner.writer.lock();
        if writer.shutting_down {
            warn!(tenant = %tenant_id, "Registry is shutting down; rejecting create");
            return Err(RegistryError::ShuttingDown(tenant_id.to_string()));
        }

        let taken = self.inner.entries.load().contains_key(tenant_id)
            || writer.provisioning.contains(tenant_id)
            || writer.closing.contains_key(tenant_id);

        if taken {
            warn!(tenant = %tenant_id, "Service data source already exists");
            return Err(RegistryError::DuplicateTenant(tenant_id.to_string()));
        }

        writer.provisioning.insert(tenant_id.to_string());
        Ok(Reservation {
            inner: &self.inner,
            tenant_id: tenant_id.to_string(),
        })
    }
}

/// Holds a key in `provisioning` until the entry is published or the create
/// fails (including cancellation of the caller's future).
struct Reservation<'a, C: PoolConnector> {
    inner: &'a RegistryInner<C>,
    tenant_id: String,
}

impl<C: PoolConnector> Reservation<'_, C> {
    /// Hands the entry back when `close_all` started after the reservation.
    fn publish(self, entry: Arc<PoolEntry<C::Pool>>) -> Result<(), Arc<PoolEntry<C::Pool>>> {
        let mut writer = self.inner.writer.lock();
        if writer.shutting_down {
            return Err(entry);
        }
        let mut next = EntryMap::clone(&self.inner.entries.load());
        next.insert(self.tenant_id.clone(), entry);
        self.inner.entries.store(Arc::new(next));
        writer.provisioning.remove(&self.tenant_id);
        Ok(())
    }
}

impl<C: PoolConnector> Drop for Reservation<'_, C> {
    fn drop(&mut self) {
        // no-op after publish, which already released the key
        self.inner.writer.lock().provisioning.remove(&self.tenant_id);
    }
}

/// Non-empty, no surrounding whitespace. Otherwise opaque and case-sensitive.
fn is_valid_tenant_id(tenant_id: &str) -> bool {
    !tenant_id.is_empty() && tenant_id.trim() == tenant_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockConnector;
    use std::collections::HashMap;

    fn registry(connector: &MockConnector) -> ConnectionPoolRegistry<MockConnector> {
        ConnectionPoolRegistry::new(connector.clone(), RegistrySettings::default())
    }

    fn quick_settings() -> RegistrySettings {
        RegistrySettings {
            provision_timeout: Duration::from_millis(100),
            close_timeout: Duration::from_millis(100),
            ..RegistrySettings::default()
        }
    }

    #[tokio::test]
    async fn create_then_lookup_returns_new_pool() {
        let connector = MockConnector::new();
        let registry = registry(&connector);

        registry.create("acme", "mock://acme", "acme", "pw").await.unwrap();

        let pool = registry.lookup("acme").expect("pool should be visible");
        assert_eq!(pool.tenant, "acme");
        assert!(registry.contains("acme"));
        assert_eq!(registry.tenant_ids(), vec!["acme".to_string()]);
        assert!(registry.status("acme").unwrap().starts_with("Pool: acme-pool"));
        assert!(registry.lookup("ACME").is_none(), "ids are case-sensitive");
    }

    #[tokio::test]
    async fn duplicate_create_fails_and_keeps_one_entry() {
        let connector = MockConnector::new();
        let registry = registry(&connector);

        registry.create("acme", "mock://acme", "u", "p").await.unwrap();
        let first = registry.lookup("acme").unwrap();

        let err = registry.create("acme", "mock://other", "u", "p").await.unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateTenant(ref t) if t == "acme"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("acme").unwrap(), first);
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test]
    async fn blank_tenant_ids_are_rejected() {
        let connector = MockConnector::new();
        let registry = registry(&connector);

        for bad in ["", "   ", " acme"] {
            let err = registry.create(bad, "mock://x", "u", "p").await.unwrap_err();
            assert!(matches!(err, RegistryError::InvalidTenantId(_)), "{bad:?}");
        }
        assert!(registry.is_empty());
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test]
    async fn connection_failure_leaves_no_entry_and_releases_key() {
        let connector = MockConnector::new();
        let registry = registry(&connector);
        connector.fail_connect("acme");

        let err = registry.create("acme", "mock://acme", "u", "p").await.unwrap_err();
        assert!(matches!(err, RegistryError::Connection { .. }));
        assert!(registry.lookup("acme").is_none());

        connector.allow_connect("acme");
        registry.create("acme", "mock://acme", "u", "p").await.unwrap();
        assert!(registry.contains("acme"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provisioning_times_out() {
        let connector = MockConnector::new();
        let registry = ConnectionPoolRegistry::new(connector.clone(), quick_settings());
        connector.delay_connect("slow", Duration::from_secs(5));

        let err = registry.create("slow", "mock://slow", "u", "p").await.unwrap_err();
        assert!(matches!(err, RegistryError::Timeout { operation: "pool provisioning", .. }));
        assert!(registry.lookup("slow").is_none());
        assert!(registry.list_all().is_empty());
    }

    #[tokio::test]
    async fn default_tenant_cannot_be_removed() {
        let connector = MockConnector::new();
        let registry = registry(&connector);

        let err = registry.remove(DEFAULT_TENANT).await.unwrap_err();
        assert!(matches!(err, RegistryError::ProtectedTenant(_)));

        registry.create(DEFAULT_TENANT, "mock://default", "u", "p").await.unwrap();
        let err = registry.remove(DEFAULT_TENANT).await.unwrap_err();
        assert!(matches!(err, RegistryError::ProtectedTenant(_)));
        assert!(registry.contains(DEFAULT_TENANT));
    }

    #[tokio::test]
    async fn removing_unknown_tenant_is_not_found() {
        let connector = MockConnector::new();
        let registry = registry(&connector);
        registry.create("acme", "mock://acme", "u", "p").await.unwrap();

        let err = registry.remove("nonexistent").await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(ref t) if t == "nonexistent"));
        assert_eq!(registry.tenant_ids(), vec!["acme".to_string()]);
    }

    #[tokio::test]
    async fn remove_unpublishes_then_closes() {
        let connector = MockConnector::new();
        let registry = registry(&connector);
        registry.create("acme", "mock://acme", "u", "p").await.unwrap();
        let pool = registry.lookup("acme").unwrap();

        registry.remove("acme").await.unwrap();

        assert!(registry.lookup("acme").is_none());
        assert!(pool.is_closed());
        assert_eq!(connector.closed_tenants(), vec!["acme".to_string()]);
        assert!(registry.list_all().is_empty());

        // the key is free again once the drain completed
        registry.create("acme", "mock://acme", "u", "p").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn create_fails_while_old_entry_is_draining() {
        let connector = MockConnector::new();
        let registry = ConnectionPoolRegistry::new(connector.clone(), quick_settings());
        registry.create("acme", "mock://acme", "u", "p").await.unwrap();
        connector.delay_close(Duration::from_secs(5));

        let err = registry.remove("acme").await.unwrap_err();
        assert!(matches!(err, RegistryError::Timeout { operation: "pool close", .. }));
        assert!(registry.lookup("acme").is_none());
        assert!(registry.status("acme").unwrap().starts_with("Closing"));

        let err = registry.create("acme", "mock://acme", "u", "p").await.unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateTenant(_)));

        // background drain still completes
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(connector.closed_tenants(), vec!["acme".to_string()]);
        assert!(registry.status("acme").is_none());

        connector.delay_close(Duration::ZERO);
        registry.create("acme", "mock://acme", "u", "p").await.unwrap();
        assert!(registry.contains("acme"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_for_one_key_yield_one_pool() {
        let connector = MockConnector::new();
        connector.delay_connect("race", Duration::from_millis(20));
        let registry = registry(&connector);

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.create("race", "mock://race", "u", "p").await })
            })
            .collect();

        let mut ok = 0;
        for attempt in join_all(attempts).await {
            match attempt.unwrap() {
                Ok(()) => ok += 1,
                Err(RegistryError::DuplicateTenant(_)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test]
    async fn auto_provision_requires_all_three_values() {
        let connector = MockConnector::new();
        let registry = registry(&connector);
        let mut vars: HashMap<String, String> = HashMap::new();
        vars.insert("ACME_DATASOURCE_URL".into(), "mock://acme".into());
        vars.insert("ACME_DB_USERNAME".into(), "acme".into());

        let created = registry
            .try_auto_provision_with("acme", |k| vars.get(k).cloned())
            .await
            .unwrap();
        assert!(!created);
        assert!(registry.is_empty());
        assert_eq!(connector.connect_count(), 0);

        vars.insert("ACME_DB_PASSWORD".into(), "secret".into());
        vars.insert("ACME_DB_MAX_POOL_SIZE".into(), "3".into());
        let created = registry
            .try_auto_provision_with("acme", |k| vars.get(k).cloned())
            .await
            .unwrap();
        assert!(created);
        assert_eq!(registry.len(), 1);

        let info = registry.describe("acme").unwrap();
        assert_eq!(info.username, "acme");
        assert_eq!(info.max_size, 3);
        assert_eq!(info.status, PoolStatus::Active);

        let again = registry.try_auto_provision_with("acme", |k| vars.get(k).cloned()).await;
        assert!(matches!(again, Err(RegistryError::DuplicateTenant(_))));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn entry_info_redacts_credentials() {
        let connector = MockConnector::new();
        let registry = registry(&connector);
        registry
            .create("acme", "mysql://root:hunter2@db:3306/acme", "root", "hunter2")
            .await
            .unwrap();

        let info = registry.describe("acme").unwrap();
        let rendered = serde_json::to_string(&info).unwrap();
        assert!(!rendered.contains("hunter2"));
        assert_eq!(info.status, PoolStatus::Active);
        assert_eq!(registry.entries().len(), 1);
    }

    #[tokio::test]
    async fn close_all_drains_every_pool() {
        let connector = MockConnector::new();
        let registry = registry(&connector);
        registry.create("a", "mock://a", "u", "p").await.unwrap();
        registry.create("b", "mock://b", "u", "p").await.unwrap();
        let a = registry.lookup("a").unwrap();

        registry.close_all().await;

        assert!(registry.is_empty());
        assert!(a.is_closed());
        let mut closed = connector.closed_tenants();
        closed.sort();
        assert_eq!(closed, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn close_all_rejects_later_creates() {
        let connector = MockConnector::new();
        let registry = registry(&connector);
        registry.close_all().await;

        let err = registry.create("acme", "mock://acme", "u", "p").await.unwrap_err();
        assert!(matches!(err, RegistryError::ShuttingDown(_)));
        assert_eq!(connector.connect_count(), 0);
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn create_racing_close_all_closes_its_pool() {
        let connector = MockConnector::new();
        connector.delay_connect("late", Duration::from_secs(1));
        let registry = registry(&connector);

        let pending = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.create("late", "mock://late", "u", "p").await })
        };
        // let the create reserve its key and start connecting
        tokio::task::yield_now().await;
        assert_eq!(connector.connect_count(), 1);

        registry.close_all().await;

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, RegistryError::ShuttingDown(_)));
        assert!(registry.lookup("late").is_none());
        assert_eq!(connector.closed_tenants(), vec!["late".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn close_all_waits_for_removed_pools_still_draining() {
        let connector = MockConnector::new();
        let registry = ConnectionPoolRegistry::new(connector.clone(), quick_settings());
        registry.create("acme", "mock://acme", "u", "p").await.unwrap();
        let pool = registry.lookup("acme").unwrap();
        connector.delay_close(Duration::from_secs(5));

        let err = registry.remove("acme").await.unwrap_err();
        assert!(matches!(err, RegistryError::Timeout { .. }));
        assert!(!pool.is_closed());

        registry.close_all().await;
        assert!(pool.is_closed());
    }

    #[test]
    fn acquire_timeouts_report_the_configured_limit() {
        let err = RegistryError::from_sqlx("acme", Duration::from_secs(30), sqlx::Error::PoolTimedOut);
        assert!(matches!(err, RegistryError::Timeout { limit, .. } if limit == Duration::from_secs(30)));
        assert_eq!(
            err.to_string(),
            "connection acquire for tenant 'acme' timed out after 30s"
        );
    }
}
