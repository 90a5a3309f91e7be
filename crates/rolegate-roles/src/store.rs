//! Configuration store capability traits
//!
//! The resolver only needs [`ConfigStore`]; the admin tooling additionally
//! needs [`ConfigStoreWriter`]. Concrete stores live elsewhere (the App
//! Configuration client, the in-memory store used by tests and local runs).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ConfigStoreError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, ConfigStoreError>;

/// Content type written alongside role values
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A key-value record held by the configuration store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSetting {
    pub key: String,
    pub value: Option<String>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

impl ConfigSetting {
    /// Create a setting with a plain value
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            content_type: None,
            etag: None,
        }
    }

    /// Create a setting holding a JSON document
    pub fn json(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            content_type: Some(JSON_CONTENT_TYPE.to_string()),
            ..Self::new(key, value)
        }
    }
}

/// Read access to a remote key-value configuration store
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read a single setting. Returns `Ok(None)` when the key does not exist.
    async fn get_setting(&self, key: &str) -> StoreResult<Option<ConfigSetting>>;
}

/// Write access, used by the role-management tooling
#[async_trait]
pub trait ConfigStoreWriter: ConfigStore {
    /// Create or replace a setting
    async fn set_setting(&self, setting: ConfigSetting) -> StoreResult<ConfigSetting>;

    /// Delete a setting. Returns `false` when the key did not exist.
    async fn delete_setting(&self, key: &str) -> StoreResult<bool>;

    /// List keys matching a filter (`exact` or `prefix*`)
    async fn list_keys(&self, filter: &str) -> StoreResult<Vec<String>>;
}

/// Key filter semantics shared by store implementations: a trailing `*`
/// matches any suffix, anything else must match exactly.
pub fn key_matches_filter(key: &str, filter: &str) -> bool {
    match filter.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == filter,
    }
}
