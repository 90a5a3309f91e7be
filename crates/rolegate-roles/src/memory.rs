//! In-memory configuration store
//!
//! Used by tests and by the portal when no remote store is configured.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::key::role_key;
use crate::role_file::RoleAssignment;
use crate::store::{key_matches_filter, ConfigSetting, ConfigStore, ConfigStoreWriter, StoreResult};

/// DashMap-backed store. Clones share the same data.
#[derive(Debug, Default, Clone)]
pub struct MemoryConfigStore {
    settings: Arc<DashMap<String, ConfigSetting>>,
    reads: Arc<AtomicU64>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with role assignments, skipping invalid entries
    pub fn from_assignments<'a>(assignments: impl IntoIterator<Item = &'a RoleAssignment>) -> Self {
        let store = Self::new();
        for assignment in assignments.into_iter().filter(|a| a.is_valid()) {
            store.insert_roles(&assignment.email, assignment.roles.as_slice());
        }
        store
    }

    /// Insert a raw setting directly
    pub fn insert(&self, setting: ConfigSetting) {
        self.settings.insert(setting.key.clone(), setting);
    }

    /// Store a role list for an email under its role key
    pub fn insert_roles(&self, email: &str, roles: &[String]) {
        let value = serde_json::Value::from(roles.to_vec()).to_string();
        self.insert(ConfigSetting::json(role_key(email), value));
    }

    /// Store a raw (possibly malformed) role value for an email
    pub fn insert_raw_roles(&self, email: &str, value: impl Into<String>) {
        self.insert(ConfigSetting::new(role_key(email), value));
    }

    pub fn get(&self, key: &str) -> Option<ConfigSetting> {
        self.settings.get(key).map(|s| s.value().clone())
    }

    /// Number of `get_setting` calls served so far
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn get_setting(&self, key: &str) -> StoreResult<Option<ConfigSetting>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.get(key))
    }
}

#[async_trait]
impl ConfigStoreWriter for MemoryConfigStore {
    async fn set_setting(&self, setting: ConfigSetting) -> StoreResult<ConfigSetting> {
        self.insert(setting.clone());
        Ok(setting)
    }

    async fn delete_setting(&self, key: &str) -> StoreResult<bool> {
        Ok(self.settings.remove(key).is_some())
    }

    async fn list_keys(&self, filter: &str) -> StoreResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .settings
            .iter()
            .filter(|entry| key_matches_filter(entry.key(), filter))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
