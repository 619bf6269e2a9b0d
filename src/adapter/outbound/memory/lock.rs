//! In-memory distributed lock for testing.
//!
//! Single-process only: locks are not shared across process boundaries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::port::{Clock, DistributedLock, LockLease, SystemClock};

pub struct MemoryLock {
    leases: Mutex<HashMap<String, LockLease>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryLock {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLock {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            leases: Mutex::new(HashMap::new()),
            clock,
        }
    }
}

#[async_trait]
impl DistributedLock for MemoryLock {
    async fn try_acquire(
        &self,
        key: &str,
        owner: &str,
        lease: Duration,
    ) -> Result<Option<LockLease>> {
        let lease = chrono::Duration::from_std(lease).map_err(|e| Error::Lock(e.to_string()))?;
        let now = self.clock.now();
        let mut leases = self.leases.lock();

        if let Some(current) = leases.get(key) {
            if current.expires_at > now && current.owner != owner {
                return Ok(None);
            }
        }

        let acquired = LockLease {
            key: key.to_string(),
            owner: owner.to_string(),
            token: uuid::Uuid::new_v4().to_string(),
            expires_at: now + lease,
        };
        leases.insert(key.to_string(), acquired.clone());
        Ok(Some(acquired))
    }

    async fn release(&self, lease: &LockLease) -> Result<bool> {
        let now = self.clock.now();
        let mut leases = self.leases.lock();
        match leases.get(&lease.key) {
            Some(current) if current.token == lease.token => {
                let live = current.expires_at > now;
                leases.remove(&lease.key);
                Ok(live)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::clock::ManualClock;

    #[tokio::test]
    async fn second_owner_is_refused_while_lease_is_live() {
        let clock = Arc::new(ManualClock::default());
        let lock = MemoryLock::with_clock(clock.clone());
        let lease = Duration::from_secs(30);

        let held = lock.try_acquire("reconciler", "a", lease).await.unwrap();
        assert!(held.is_some());
        assert!(lock
            .try_acquire("reconciler", "b", lease)
            .await
            .unwrap()
            .is_none());

        clock.advance(chrono::Duration::seconds(30));
        assert!(lock
            .try_acquire("reconciler", "b", lease)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn release_frees_the_key() {
        let lock = MemoryLock::new();
        let lease = Duration::from_secs(30);

        let held = lock
            .try_acquire("reconciler", "a", lease)
            .await
            .unwrap()
            .unwrap();
        assert!(lock.release(&held).await.unwrap());
        assert!(!lock.release(&held).await.unwrap());
        assert!(lock
            .try_acquire("reconciler", "b", lease)
            .await
            .unwrap()
            .is_some());
    }
}
