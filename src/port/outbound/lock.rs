//! Distributed mutual exclusion for singleton roles.
//!
//! Used so only one process runs the reconciler at a time. Locks are
//! time-bounded leases: a holder that crashes loses the lock once the lease
//! runs out, and a holder that outlives its lease may overlap with the next
//! one.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// A held lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    pub key: String,
    pub owner: String,
    /// Unique per acquisition; required to release.
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Try to take `key` for `lease`. Returns `None` if another owner holds
    /// an unexpired lease.
    async fn try_acquire(
        &self,
        key: &str,
        owner: &str,
        lease: Duration,
    ) -> Result<Option<LockLease>>;

    /// Release a lease. Returns `false` if it had already expired or been
    /// taken over.
    async fn release(&self, lease: &LockLease) -> Result<bool>;
}
