//! Bulk application of role files to a configuration store

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::SyncError;
use crate::key::{parse_role_key, role_key, ROLE_KEY_FILTER};
use crate::retry::{with_retry, RetryConfig};
use crate::role_file::RoleAssignment;
use crate::store::{ConfigSetting, ConfigStoreWriter};

/// Number of users written per batch
pub const DEFAULT_BATCH_SIZE: usize = 25;

/// Options for [`RoleSync::apply`]
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Delete role keys for users missing from the input
    pub remove_missing: bool,
    /// Users per batch
    pub batch_size: usize,
    /// Retry policy for listing existing keys
    pub retry: RetryConfig,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            remove_missing: false,
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryConfig::default(),
        }
    }
}

impl SyncOptions {
    #[must_use]
    pub fn with_remove_missing(mut self, remove_missing: bool) -> Self {
        self.remove_missing = remove_missing;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Outcome of a sync run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub successful_updates: usize,
    pub failed_updates: usize,
    pub successful_removals: usize,
    pub failed_removals: usize,
    pub skipped: usize,
    pub total_users: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl SyncReport {
    /// Whether any write or delete failed
    pub fn has_failures(&self) -> bool {
        self.failed_updates > 0 || self.failed_removals > 0
    }
}

/// Applies role assignments to a writable store
pub struct RoleSync<S: ConfigStoreWriter + ?Sized> {
    store: Arc<S>,
}

impl<S: ConfigStoreWriter + ?Sized> RoleSync<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Write every valid assignment and, optionally, remove users that are
    /// no longer listed.
    ///
    /// Per-user failures are counted in the report. Failing to list existing
    /// keys (after retries) aborts the run before anything is written.
    pub async fn apply(
        &self,
        assignments: &[RoleAssignment],
        options: &SyncOptions,
    ) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let mut report = SyncReport {
            total_users: assignments.len(),
            ..SyncReport::default()
        };

        let existing_keys = if options.remove_missing {
            tracing::info!("fetching existing role keys");
            let keys = with_retry(options.retry.clone(), || {
                self.store.list_keys(ROLE_KEY_FILTER)
            })
            .await?;
            tracing::info!(count = keys.len(), "found existing role keys");
            keys
        } else {
            Vec::new()
        };

        let batch_size = options.batch_size.max(1);
        for (index, batch) in assignments.chunks(batch_size).enumerate() {
            let start = index * batch_size;
            tracing::info!(
                "processing batch {}-{} of {} users",
                start + 1,
                start + batch.len(),
                assignments.len()
            );
            self.apply_batch(batch, &mut report).await;
        }

        if options.remove_missing {
            let current: HashSet<&str> = assignments
                .iter()
                .filter(|a| !a.email.is_empty())
                .map(|a| a.email.as_str())
                .collect();
            self.remove_obsolete(&existing_keys, &current, &mut report)
                .await;
        }

        report.elapsed = started.elapsed();
        Ok(report)
    }

    async fn apply_batch(&self, batch: &[RoleAssignment], report: &mut SyncReport) {
        for assignment in batch {
            if !assignment.is_valid() {
                tracing::info!(
                    email = %assignment.email,
                    roles = %assignment.roles,
                    "skipping invalid user entry"
                );
                report.skipped += 1;
                continue;
            }

            let key = role_key(&assignment.email);
            let value = match serde_json::to_string(assignment.roles.as_slice()) {
                Ok(value) => value,
                Err(err) => {
                    tracing::error!(email = %assignment.email, error = %err, "failed to encode roles");
                    report.failed_updates += 1;
                    continue;
                }
            };

            match self.store.set_setting(ConfigSetting::json(&key, value)).await {
                Ok(_) => {
                    tracing::info!("set {} to {}", key, assignment.roles);
                    report.successful_updates += 1;
                }
                Err(err) => {
                    tracing::error!(email = %assignment.email, error = %err, "failed to set roles");
                    report.failed_updates += 1;
                }
            }
        }
    }

    async fn remove_obsolete(
        &self,
        existing_keys: &[String],
        current: &HashSet<&str>,
        report: &mut SyncReport,
    ) {
        for key in existing_keys {
            let Some(email) = parse_role_key(key) else {
                continue;
            };
            if current.contains(email) {
                continue;
            }

            tracing::info!("removing {} as user is no longer in the list", key);
            match self.store.delete_setting(key).await {
                Ok(true) => report.successful_removals += 1,
                Ok(false) => {
                    tracing::info!("key {} not found, already deleted", key);
                    report.successful_removals += 1;
                }
                Err(err) => {
                    tracing::error!(key = %key, error = %err, "failed to remove role key");
                    report.failed_removals += 1;
                }
            }
        }
    }
}

impl<S: ConfigStoreWriter + ?Sized> std::fmt::Debug for RoleSync<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleSync").finish_non_exhaustive()
    }
}
