//! Rolegate Roles - Role resolution and caching
//!
//! Resolves a principal's roles from a remote key-value configuration store,
//! caches them per session with a fixed TTL, and bulk-applies role files to
//! the store for the admin tooling.
//!
//! # Example
//!
//! ```rust,ignore
//! use rolegate_roles::{MemoryConfigStore, RoleCache, RoleResolver};
//!
//! let resolver = RoleResolver::new(Arc::new(MemoryConfigStore::new()));
//! let cache = RoleCache::default();
//!
//! let roles = resolver.get_roles(&cache, &principal).await;
//! resolver.refresh_roles(&cache, &principal);
//! ```

pub mod cache;
pub mod error;
pub mod key;
pub mod memory;
pub mod resolver;
pub mod retry;
pub mod role_file;
pub mod store;
pub mod sync;

pub use cache::{Clock, ManualClock, RoleCache, RoleCacheEntry, SystemClock, DEFAULT_ROLE_CACHE_TTL};
pub use error::{ConfigStoreError, RoleLookupError, RoleParseError, SyncError};
pub use key::{parse_role_key, role_key, ROLE_KEY_FILTER};
pub use memory::MemoryConfigStore;
pub use resolver::{parse_role_value, RoleResolver};
pub use retry::{with_retry, RetryConfig, RetryableError};
pub use role_file::{RoleAssignment, RoleFile};
pub use store::{ConfigSetting, ConfigStore, ConfigStoreWriter, StoreResult};
pub use sync::{RoleSync, SyncOptions, SyncReport, DEFAULT_BATCH_SIZE};
