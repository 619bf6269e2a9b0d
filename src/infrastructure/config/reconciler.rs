//! Reconciler configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::application::ReconcilerSettings;

const fn default_true() -> bool {
    true
}

const fn default_interval_secs() -> u64 {
    30
}

const fn default_batch_size() -> usize {
    1000
}

const fn default_max_batches() -> usize {
    10
}

const fn default_orphan_grace_secs() -> u64 {
    30
}

const fn default_delete_batch_size() -> usize {
    500
}

fn default_lock_key() -> String {
    "waitnotify-reconciler".to_string()
}

const fn default_lock_lease_secs() -> u64 {
    60
}

/// `[reconciler]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcilerConfig {
    /// Run the periodic reconciler in `waitnotify run`.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Responses read per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_max_batches")]
    pub max_batches: usize,

    /// Minimum age before an unreferenced response is deleted.
    #[serde(default = "default_orphan_grace_secs")]
    pub orphan_grace_secs: u64,

    #[serde(default = "default_delete_batch_size")]
    pub delete_batch_size: usize,

    /// Distributed lock key shared by every reconciler instance.
    #[serde(default = "default_lock_key")]
    pub lock_key: String,

    /// Should exceed the time one pass takes.
    #[serde(default = "default_lock_lease_secs")]
    pub lock_lease_secs: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_secs: default_interval_secs(),
            batch_size: default_batch_size(),
            max_batches: default_max_batches(),
            orphan_grace_secs: default_orphan_grace_secs(),
            delete_batch_size: default_delete_batch_size(),
            lock_key: default_lock_key(),
            lock_lease_secs: default_lock_lease_secs(),
        }
    }
}

impl ReconcilerConfig {
    /// Settings for a reconciler identified by `owner` in the lock table.
    #[must_use]
    pub fn settings(&self, owner: impl Into<String>) -> ReconcilerSettings {
        ReconcilerSettings {
            interval: Duration::from_secs(self.interval_secs),
            batch_size: self.batch_size,
            max_batches: self.max_batches,
            orphan_grace: chrono::Duration::seconds(
                i64::try_from(self.orphan_grace_secs).unwrap_or(i64::MAX),
            ),
            delete_batch_size: self.delete_batch_size,
            lock_key: self.lock_key.clone(),
            lock_lease: Duration::from_secs(self.lock_lease_secs),
            owner: owner.into(),
        }
    }
}
