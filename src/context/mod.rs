//! Execution-scoped service (tenant) context.
//!
//! Every inbound unit of work runs inside [`RequestContext::scope`] (or
//! [`RequestContext::with_tenant`]). Inside a scope the value lives in Tokio
//! task-local storage, so two requests interleaved on the same worker thread
//! never see each other's tenant. Plain OS threads with no Tokio runtime
//! fall back to a thread-local slot. Async code outside a scope has no
//! context at all: worker threads are shared by every task they poll.
//!
//! ```rust,ignore
//! RequestContext::with_tenant("douzone", async {
//!     let route = resolver.resolve();
//!     assert_eq!(route.tenant_id, "douzone");
//! })
//! .await;
//! ```

use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;

use thiserror::Error;
use tracing::warn;

/// System-of-record tenant. Always routable, never removable.
pub const DEFAULT_TENANT: &str = "integrated_cms";

tokio::task_local! {
    static TASK_TENANT: RefCell<Option<String>>;
}

thread_local! {
    static THREAD_TENANT: RefCell<Option<String>> = const { RefCell::new(None) };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("Service context is not set")]
    NotSet,
}

/// Accessors for the current unit of work's service id.
pub struct RequestContext;

impl RequestContext {
    /// Store the service id for the calling unit of work.
    ///
    /// The value is trimmed; a blank value clears the context.
    pub fn set(tenant_id: impl AsRef<str>) {
        Self::write(normalize(tenant_id.as_ref()));
    }

    /// Current service id, if one is set.
    pub fn get() -> Option<String> {
        match TASK_TENANT.try_with(|slot| slot.borrow().clone()) {
            Ok(value) => value,
            Err(_) if on_runtime() => None,
            Err(_) => THREAD_TENANT.with(|slot| slot.borrow().clone()),
        }
    }

    /// Remove the stored value. Safe to call when nothing is set.
    pub fn clear() {
        Self::write(None);
    }

    /// Current service id, or [`DEFAULT_TENANT`] when unset.
    pub fn current_or_default() -> String {
        Self::get().unwrap_or_else(|| DEFAULT_TENANT.to_string())
    }

    /// Whether the current unit of work targets the default tenant explicitly.
    pub fn is_default_tenant() -> bool {
        Self::get().as_deref() == Some(DEFAULT_TENANT)
    }

    /// Current service id, or an error when no context has been set.
    pub fn require() -> Result<String, ContextError> {
        Self::get().ok_or(ContextError::NotSet)
    }

    /// Whether a task scope is active for the calling code.
    pub fn in_scope() -> bool {
        TASK_TENANT.try_with(|_| ()).is_ok()
    }

    /// Run `future` as one unit of work with a fresh, empty context.
    ///
    /// The context is dropped when the future finishes, fails, panics or is
    /// cancelled, so nothing leaks into the next request served by the task.
    pub async fn scope<F>(future: F) -> F::Output
    where
        F: Future,
    {
        TASK_TENANT.scope(RefCell::new(None), future).await
    }

    /// Run `future` with the context already set to `tenant_id`.
    pub async fn with_tenant<F>(tenant_id: impl AsRef<str>, future: F) -> F::Output
    where
        F: Future,
    {
        let initial = normalize(tenant_id.as_ref());
        TASK_TENANT.scope(RefCell::new(initial), future).await
    }

    /// Wrap `future` so it carries the caller's current value.
    ///
    /// Tasks started with `tokio::spawn` begin with no context; use this to
    /// hand the value over explicitly.
    pub fn propagate<F>(future: F) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        let current = Self::get();
        TASK_TENANT.scope(RefCell::new(current), future)
    }

    /// Set the value for synchronous code on a thread that is not driven by
    /// a Tokio runtime.
    ///
    /// The previous value is restored when the guard drops. The guard is not
    /// `Send`, so it cannot be held across an `.await` in a spawned task.
    pub fn enter(tenant_id: impl AsRef<str>) -> ContextGuard {
        let value = normalize(tenant_id.as_ref());
        let previous = THREAD_TENANT.with(|slot| slot.replace(value));
        ContextGuard {
            previous,
            _not_send: PhantomData,
        }
    }

    fn write(value: Option<String>) {
        if Self::in_scope() {
            TASK_TENANT.with(|slot| *slot.borrow_mut() = value);
        } else if on_runtime() {
            // a thread slot here would be visible to every task on this worker
            warn!(tenant = ?value, "Service context changed outside a request scope; ignored");
        } else {
            THREAD_TENANT.with(|slot| *slot.borrow_mut() = value);
        }
    }
}

/// Restores the previous thread-level service id on drop.
#[must_use = "the context is reset as soon as the guard is dropped"]
pub struct ContextGuard {
    previous: Option<String>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        THREAD_TENANT.with(|slot| *slot.borrow_mut() = previous);
    }
}

fn on_runtime() -> bool {
    tokio::runtime::Handle::try_current().is_ok()
}

fn normalize(tenant_id: &str) -> Option<String> {
    let trimmed = tenant_id.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
