//! Role resolver - reads a principal's roles through a session's cache

use std::sync::Arc;

use rolegate_types::{Principal, RoleSet};
use tracing::instrument;

use crate::cache::RoleCache;
use crate::error::{RoleLookupError, RoleParseError};
use crate::key::role_key;
use crate::store::ConfigStore;

/// Resolves roles for authenticated principals.
///
/// The resolver is stateless apart from its store handle; the cache belongs
/// to the caller's session and is passed in on every call.
pub struct RoleResolver<S: ConfigStore + ?Sized = dyn ConfigStore> {
    store: Arc<S>,
}

impl<S: ConfigStore + ?Sized> Clone for RoleResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ConfigStore + ?Sized> RoleResolver<S> {
    /// Create a resolver over a configuration store
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Roles for a principal.
    ///
    /// Served from the cache while the entry is fresh; otherwise read from the
    /// store and cached. Store failures and malformed values never reach the
    /// caller: they are logged and resolve to an empty role set, which is not
    /// cached so the next call retries.
    #[instrument(skip(self, cache, principal), fields(email = %principal.email()), level = "debug")]
    pub async fn get_roles(&self, cache: &RoleCache, principal: &Principal) -> RoleSet {
        if let Some(roles) = cache.get_fresh(principal.email()) {
            tracing::trace!("role cache hit");
            metrics::counter!("rolegate_role_cache_hits").increment(1);
            return roles;
        }

        metrics::counter!("rolegate_role_cache_misses").increment(1);

        let generation = cache.generation();
        match self.fetch_roles(principal.email()).await {
            Ok(roles) => {
                tracing::debug!(roles = %roles, "roles fetched from store");
                if cache
                    .insert_if_current(principal.email(), roles.clone(), generation)
                    .is_none()
                {
                    tracing::debug!("role cache invalidated during lookup, result not cached");
                }
                roles
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    code = err.error_code(),
                    "role lookup failed, treating user as having no roles"
                );
                metrics::counter!("rolegate_role_lookup_failures", "reason" => err.error_code())
                    .increment(1);
                RoleSet::new()
            }
        }
    }

    /// Whether the principal currently holds a role
    pub async fn has_role(&self, cache: &RoleCache, principal: &Principal, role: &str) -> bool {
        self.get_roles(cache, principal).await.contains(role)
    }

    /// Drop the principal's cached roles so the next lookup reads the store.
    ///
    /// Returns whether a cached entry existed.
    pub fn refresh_roles(&self, cache: &RoleCache, principal: &Principal) -> bool {
        let removed = cache.invalidate(principal.email());
        tracing::debug!(email = %principal.email(), removed, "role cache invalidated");
        removed
    }

    /// Read and parse roles from the store, bypassing any cache.
    ///
    /// An absent key or an empty value yields an empty role set.
    pub async fn fetch_roles(&self, email: &str) -> Result<RoleSet, RoleLookupError> {
        let key = role_key(email);
        let setting = self.store.get_setting(&key).await?;

        match setting.and_then(|s| s.value) {
            Some(value) if !value.trim().is_empty() => Ok(parse_role_value(&key, &value)?),
            _ => {
                tracing::debug!(key = %key, "no role assignment found");
                Ok(RoleSet::new())
            }
        }
    }
}

impl<S: ConfigStore + ?Sized> std::fmt::Debug for RoleResolver<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleResolver").finish_non_exhaustive()
    }
}

/// Parse a stored role value: a JSON array of role-name strings
pub fn parse_role_value(key: &str, value: &str) -> Result<RoleSet, RoleParseError> {
    serde_json::from_str::<Vec<String>>(value)
        .map(RoleSet::from)
        .map_err(|source| RoleParseError {
            key: key.to_string(),
            source,
        })
}
