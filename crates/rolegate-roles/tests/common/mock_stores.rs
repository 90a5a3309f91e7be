//! Store doubles for resolver tests

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;
use rolegate_roles::{ConfigSetting, ConfigStore, ConfigStoreError, MemoryConfigStore, StoreResult};
use rolegate_types::Principal;

/// Wraps a memory store and can be switched into a failing state
#[derive(Debug, Default, Clone)]
pub struct ToggleStore {
    inner: MemoryConfigStore,
    failing: Arc<AtomicBool>,
    calls: Arc<AtomicU64>,
}

impl ToggleStore {
    pub fn new(inner: MemoryConfigStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &MemoryConfigStore {
        &self.inner
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every `get_setting` call, failed or not
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigStore for ToggleStore {
    async fn get_setting(&self, key: &str) -> StoreResult<Option<ConfigSetting>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ConfigStoreError::Unavailable("503 Service Unavailable".into()));
        }
        self.inner.get_setting(key).await
    }
}

/// Holds the next read open after it has fetched its value, until released
#[derive(Debug, Default, Clone)]
pub struct GatedStore {
    inner: MemoryConfigStore,
    armed: Arc<AtomicBool>,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl GatedStore {
    pub fn new(inner: MemoryConfigStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &MemoryConfigStore {
        &self.inner
    }

    /// Hold the next `get_setting` call
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Wait until the held call has read its value
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl ConfigStore for GatedStore {
    async fn get_setting(&self, key: &str) -> StoreResult<Option<ConfigSetting>> {
        let value = self.inner.get_setting(key).await;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        value
    }
}

/// Principal with a derived display name
pub fn principal(email: &str) -> Principal {
    let name = email.split('@').next().unwrap_or(email);
    Principal::new(format!("oid-{name}"), email, name)
}
