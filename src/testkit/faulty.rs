//! Store wrapper that fails selected operations on demand.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::adapter::outbound::memory::MemoryStore;
use crate::domain::{
    CorrelationId, InsertOutcome, Response, ResponseCursor, WaitInstance, WaitInstanceError,
    WaitInstanceId, WaitStatus,
};
use crate::error::{Error, Result};
use crate::port::{PurgedWaits, ResponseStore, WaitStore};

/// Delegates to a [`MemoryStore`] while injecting database errors.
///
/// Shares the inner store, so data written through a harness engine is
/// visible here.
#[derive(Debug)]
pub struct FaultyStore {
    inner: Arc<MemoryStore>,
    fail_complete: AtomicBool,
    poisoned_lookup: Mutex<Option<CorrelationId>>,
    delete_calls: AtomicUsize,
}

impl FaultyStore {
    #[must_use]
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_complete: AtomicBool::new(false),
            poisoned_lookup: Mutex::new(None),
            delete_calls: AtomicUsize::new(0),
        }
    }

    /// Make `complete` fail until reset.
    pub fn fail_complete(&self, fail: bool) {
        self.fail_complete.store(fail, Ordering::SeqCst);
    }

    /// Make `find_waits_for` fail whenever `correlation_id` is requested.
    pub fn fail_lookup_for(&self, correlation_id: &str) {
        *self.poisoned_lookup.lock() = CorrelationId::try_new(correlation_id).ok();
    }

    /// Number of `delete_responses` calls seen.
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    fn injected(operation: &str) -> Error {
        Error::Database(format!("injected {operation} failure"))
    }
}

#[async_trait]
impl WaitStore for FaultyStore {
    async fn insert_wait(&self, wait: &WaitInstance) -> Result<()> {
        self.inner.insert_wait(wait).await
    }

    async fn get_wait(
        &self,
        id: &WaitInstanceId,
        now: DateTime<Utc>,
    ) -> Result<Option<WaitInstance>> {
        self.inner.get_wait(id, now).await
    }

    async fn find_waits_for(
        &self,
        correlation_ids: &[CorrelationId],
        now: DateTime<Utc>,
    ) -> Result<Vec<WaitInstance>> {
        let poisoned = self.poisoned_lookup.lock().clone();
        if let Some(poisoned) = poisoned {
            if correlation_ids.contains(&poisoned) {
                return Err(Self::injected("lookup"));
            }
        }
        self.inner.find_waits_for(correlation_ids, now).await
    }

    async fn try_claim(
        &self,
        id: &WaitInstanceId,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<bool> {
        self.inner.try_claim(id, now, lease_until).await
    }

    async fn release_claim(&self, id: &WaitInstanceId, now: DateTime<Utc>) -> Result<bool> {
        self.inner.release_claim(id, now).await
    }

    async fn complete(
        &self,
        id: &WaitInstanceId,
        status: WaitStatus,
        valid_until: DateTime<Utc>,
    ) -> Result<bool> {
        if self.fail_complete.load(Ordering::SeqCst) {
            return Err(Self::injected("complete"));
        }
        self.inner.complete(id, status, valid_until).await
    }

    async fn record_failure(&self, failure: &WaitInstanceError) -> Result<()> {
        self.inner.record_failure(failure).await
    }

    async fn failures_for(&self, id: &WaitInstanceId) -> Result<Vec<WaitInstanceError>> {
        self.inner.failures_for(id).await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<PurgedWaits> {
        WaitStore::purge_expired(self.inner.as_ref(), now).await
    }
}

#[async_trait]
impl ResponseStore for FaultyStore {
    async fn insert_response(&self, response: &Response) -> Result<InsertOutcome> {
        self.inner.insert_response(response).await
    }

    async fn get_responses(
        &self,
        correlation_ids: &[CorrelationId],
        now: DateTime<Utc>,
    ) -> Result<Vec<Response>> {
        self.inner.get_responses(correlation_ids, now).await
    }

    async fn scan_responses(
        &self,
        after: Option<&ResponseCursor>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Response>> {
        self.inner.scan_responses(after, limit, now).await
    }

    async fn delete_responses(&self, correlation_ids: &[CorrelationId]) -> Result<usize> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_responses(correlation_ids).await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        ResponseStore::purge_expired(self.inner.as_ref(), now).await
    }
}
