//! Session-scoped role cache with a fixed TTL
//!
//! Each session owns one [`RoleCache`]. Entries are checked lazily on access:
//! an entry is fresh only while `now - fetched_at < ttl`. There is no
//! background eviction.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rolegate_types::{normalize_email, RoleSet};

/// Default time-to-live for cached roles (5 minutes)
pub const DEFAULT_ROLE_CACHE_TTL: Duration = Duration::from_secs(300);

/// Source of the current time
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now_millis: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now_millis: Arc::new(AtomicI64::new(start.timestamp_millis())),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let millis = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.now_millis.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set(&self, to: DateTime<Utc>) {
        self.now_millis.store(to.timestamp_millis(), Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.now_millis.load(Ordering::SeqCst))
            .unwrap_or_default()
    }
}

/// Cached roles and when they were fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCacheEntry {
    pub roles: RoleSet,
    pub fetched_at: DateTime<Utc>,
}

impl RoleCacheEntry {
    /// Whether the entry is still within its TTL at `now`
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match (now - self.fetched_at).to_std() {
            Ok(age) => age < ttl,
            // fetched_at is in the future (clock moved backwards)
            Err(_) => true,
        }
    }
}

/// Role cache owned by a session context.
///
/// Keyed by normalized email so a session can hold the entry for its
/// principal; concurrent requests from the same session share it safely.
///
/// Every invalidation bumps a generation counter. A store read started
/// before an invalidation must not repopulate the cache, so readers take the
/// generation first and write back with [`RoleCache::insert_if_current`].
#[derive(Debug)]
pub struct RoleCache {
    entries: DashMap<String, RoleCacheEntry>,
    generation: AtomicU64,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl RoleCache {
    /// Create a cache using the wall clock
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create a cache with a custom clock
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            generation: AtomicU64::new(0),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Cached roles for an email if the entry is still fresh.
    ///
    /// A stale entry is dropped on the way out.
    pub fn get_fresh(&self, email: &str) -> Option<RoleSet> {
        let key = normalize_email(email);
        let now = self.clock.now();

        if let Some(entry) = self.entries.get(&key) {
            if entry.is_fresh(now, self.ttl) {
                return Some(entry.roles.clone());
            }
        }

        self.entries
            .remove_if(&key, |_, entry| !entry.is_fresh(now, self.ttl));
        None
    }

    /// Raw entry regardless of freshness
    pub fn entry(&self, email: &str) -> Option<RoleCacheEntry> {
        self.entries
            .get(&normalize_email(email))
            .map(|e| e.value().clone())
    }

    /// Store roles with `fetched_at = now`
    pub fn insert(&self, email: &str, roles: RoleSet) -> RoleCacheEntry {
        let entry = RoleCacheEntry {
            roles,
            fetched_at: self.clock.now(),
        };
        self.entries.insert(normalize_email(email), entry.clone());
        entry
    }

    /// Current invalidation generation
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Store roles only if nothing was invalidated since `generation` was
    /// read. Returns `None` when the write was discarded.
    pub fn insert_if_current(&self, email: &str, roles: RoleSet, generation: u64) -> Option<RoleCacheEntry> {
        // The shard lock is held across the check so an invalidation either
        // lands before it (write skipped) or removes the write afterwards.
        let slot = self.entries.entry(normalize_email(email));
        if self.generation() != generation {
            return None;
        }
        let entry = RoleCacheEntry {
            roles,
            fetched_at: self.clock.now(),
        };
        slot.insert(entry.clone());
        Some(entry)
    }

    /// Drop the entry for an email. Returns whether one existed.
    pub fn invalidate(&self, email: &str) -> bool {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.remove(&normalize_email(email)).is_some()
    }

    /// Drop every entry, returning how many were removed
    pub fn clear(&self) -> usize {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RoleCache {
    fn default() -> Self {
        Self::new(DEFAULT_ROLE_CACHE_TTL)
    }
}
