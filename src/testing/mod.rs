use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::database::{PoolConnector, PoolSpec, RegistryError};

/// In-memory pool handle for registry and routing tests
#[derive(Debug, Clone)]
pub struct MockPool {
    pub id: usize,
    pub tenant: String,
    pub url: String,
    closed: Arc<AtomicBool>,
}

impl MockPool {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl PartialEq for MockPool {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[derive(Default)]
struct MockState {
    next_id: AtomicUsize,
    connects: AtomicUsize,
    failing: Mutex<HashSet<String>>,
    connect_delays: Mutex<HashMap<String, Duration>>,
    close_delay: Mutex<Duration>,
    closed: Mutex<Vec<String>>,
}

/// Connector that never touches a database.
///
/// Failures and delays are scripted per tenant id. Clones share state, so a
/// test can keep one handle while the registry owns another.
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<MockState>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_connect(&self, tenant_id: &str) {
        self.state.failing.lock().insert(tenant_id.to_string());
    }

    pub fn allow_connect(&self, tenant_id: &str) {
        self.state.failing.lock().remove(tenant_id);
    }

    pub fn delay_connect(&self, tenant_id: &str, delay: Duration) {
        self.state
            .connect_delays
            .lock()
            .insert(tenant_id.to_string(), delay);
    }

    pub fn delay_close(&self, delay: Duration) {
        *self.state.close_delay.lock() = delay;
    }

    /// Number of `connect` calls that got past validation
    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Tenants whose pools finished closing, in order
    pub fn closed_tenants(&self) -> Vec<String> {
        self.state.closed.lock().clone()
    }

    fn build(&self, spec: &PoolSpec) -> MockPool {
        MockPool {
            id: self.state.next_id.fetch_add(1, Ordering::SeqCst),
            tenant: spec.tenant_id.clone(),
            url: spec.url.clone(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl PoolConnector for MockConnector {
    type Pool = MockPool;

    async fn connect(&self, spec: &PoolSpec) -> Result<MockPool, RegistryError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);

        let delay = self.state.connect_delays.lock().get(&spec.tenant_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.state.failing.lock().contains(&spec.tenant_id) {
            return Err(RegistryError::Connection {
                tenant: spec.tenant_id.clone(),
                message: "connection refused".to_string(),
            });
        }
        Ok(self.build(spec))
    }

    fn connect_lazy(&self, spec: &PoolSpec) -> Result<MockPool, RegistryError> {
        if self.state.failing.lock().contains(&spec.tenant_id) {
            return Err(RegistryError::Connection {
                tenant: spec.tenant_id.clone(),
                message: "invalid configuration".to_string(),
            });
        }
        Ok(self.build(spec))
    }

    async fn close(&self, pool: MockPool) {
        let delay = *self.state.close_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        pool.closed.store(true, Ordering::Release);
        self.state.closed.lock().push(pool.tenant.clone());
    }

    fn describe(&self, pool: &MockPool) -> String {
        format!("Pool: {}-pool, Active: 0, Idle: 0, Total: 0", pool.tenant)
    }
}
