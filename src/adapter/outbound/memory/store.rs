//! In-memory store implementation for testing.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::domain::{
    CorrelationId, InsertOutcome, Response, ResponseCursor, WaitInstance, WaitInstanceError,
    WaitInstanceId, WaitStatus,
};
use crate::error::Result;
use crate::port::{PurgedWaits, ResponseStore, WaitStore};

#[derive(Debug, Default)]
struct WaitTables {
    waits: HashMap<WaitInstanceId, WaitInstance>,
    /// Correlation ID -> joins waiting on it.
    index: HashMap<CorrelationId, BTreeSet<WaitInstanceId>>,
    failures: Vec<WaitInstanceError>,
}

impl WaitTables {
    fn unindex(&mut self, wait: &WaitInstance) {
        for correlation_id in &wait.correlation_ids {
            if let Some(ids) = self.index.get_mut(correlation_id) {
                ids.remove(&wait.id);
                if ids.is_empty() {
                    self.index.remove(correlation_id);
                }
            }
        }
    }

    /// True when a live join waits on `correlation_id`.
    fn pins(&self, correlation_id: &CorrelationId, now: DateTime<Utc>) -> bool {
        self.index.get(correlation_id).is_some_and(|ids| {
            ids.iter()
                .filter_map(|id| self.waits.get(id))
                .any(|w| !w.is_expired(now))
        })
    }
}

/// In-memory wait registry and response table.
///
/// Each method takes the relevant write lock for its whole body, which gives
/// the same single-document atomicity a real store provides for
/// conditional updates. Methods that need both tables lock the joins before
/// the responses.
#[derive(Debug, Default)]
pub struct MemoryStore {
    waits: RwLock<WaitTables>,
    responses: RwLock<BTreeMap<CorrelationId, Response>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of joins held, expired ones included.
    pub fn wait_count(&self) -> usize {
        self.waits.read().waits.len()
    }

    /// Number of responses held, expired ones included.
    pub fn response_count(&self) -> usize {
        self.responses.read().len()
    }
}

#[async_trait]
impl WaitStore for MemoryStore {
    async fn insert_wait(&self, wait: &WaitInstance) -> Result<()> {
        let mut tables = self.waits.write();
        for correlation_id in &wait.correlation_ids {
            tables
                .index
                .entry(correlation_id.clone())
                .or_default()
                .insert(wait.id.clone());
        }
        tables.waits.insert(wait.id.clone(), wait.clone());
        Ok(())
    }

    async fn get_wait(
        &self,
        id: &WaitInstanceId,
        now: DateTime<Utc>,
    ) -> Result<Option<WaitInstance>> {
        Ok(self
            .waits
            .read()
            .waits
            .get(id)
            .filter(|w| !w.is_expired(now))
            .cloned())
    }

    async fn find_waits_for(
        &self,
        correlation_ids: &[CorrelationId],
        now: DateTime<Utc>,
    ) -> Result<Vec<WaitInstance>> {
        let tables = self.waits.read();
        let ids: BTreeSet<&WaitInstanceId> = correlation_ids
            .iter()
            .filter_map(|c| tables.index.get(c))
            .flatten()
            .collect();

        Ok(ids
            .into_iter()
            .filter_map(|id| tables.waits.get(id))
            .filter(|w| !w.is_expired(now))
            .cloned()
            .collect())
    }

    async fn try_claim(
        &self,
        id: &WaitInstanceId,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.waits.write();
        match tables.waits.get_mut(id) {
            Some(wait) if !wait.is_expired(now) && wait.is_claimable(now) => {
                wait.claim_lease_until = lease_until;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_claim(&self, id: &WaitInstanceId, now: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.waits.write();
        match tables.waits.get_mut(id) {
            Some(wait) if wait.status == WaitStatus::New => {
                wait.claim_lease_until = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete(
        &self,
        id: &WaitInstanceId,
        status: WaitStatus,
        valid_until: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.waits.write();
        match tables.waits.get_mut(id) {
            Some(wait) if wait.status == WaitStatus::New => {
                wait.status = status;
                wait.valid_until = valid_until;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_failure(&self, failure: &WaitInstanceError) -> Result<()> {
        self.waits.write().failures.push(failure.clone());
        Ok(())
    }

    async fn failures_for(&self, id: &WaitInstanceId) -> Result<Vec<WaitInstanceError>> {
        Ok(self
            .waits
            .read()
            .failures
            .iter()
            .filter(|f| &f.wait_instance_id == id)
            .cloned()
            .collect())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<PurgedWaits> {
        let mut tables = self.waits.write();

        let expired: Vec<WaitInstance> = tables
            .waits
            .values()
            .filter(|w| w.is_expired(now))
            .cloned()
            .collect();
        for wait in &expired {
            tables.unindex(wait);
            tables.waits.remove(&wait.id);
        }

        let before = tables.failures.len();
        tables.failures.retain(|f| f.valid_until > now);

        Ok(PurgedWaits {
            waits: expired.len(),
            failures: before - tables.failures.len(),
        })
    }
}

#[async_trait]
impl ResponseStore for MemoryStore {
    async fn insert_response(&self, response: &Response) -> Result<InsertOutcome> {
        let mut responses = self.responses.write();
        if responses.contains_key(&response.correlation_id) {
            return Ok(InsertOutcome::Duplicate);
        }
        responses.insert(response.correlation_id.clone(), response.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn get_responses(
        &self,
        correlation_ids: &[CorrelationId],
        now: DateTime<Utc>,
    ) -> Result<Vec<Response>> {
        let tables = self.waits.read();
        let responses = self.responses.read();
        Ok(correlation_ids
            .iter()
            .filter_map(|id| responses.get(id))
            .filter(|r| !r.is_expired(now) || tables.pins(&r.correlation_id, now))
            .cloned()
            .collect())
    }

    async fn scan_responses(
        &self,
        after: Option<&ResponseCursor>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Response>> {
        let tables = self.waits.read();
        let responses = self.responses.read();
        let mut live: Vec<&Response> = responses
            .values()
            .filter(|r| !r.is_expired(now) || tables.pins(&r.correlation_id, now))
            .filter(|r| match after {
                Some(cursor) => {
                    (r.created_at, &r.correlation_id)
                        > (cursor.created_at, &cursor.correlation_id)
                }
                None => true,
            })
            .collect();
        live.sort_by(|a, b| {
            (a.created_at, &a.correlation_id).cmp(&(b.created_at, &b.correlation_id))
        });

        Ok(live.into_iter().take(limit).cloned().collect())
    }

    async fn delete_responses(&self, correlation_ids: &[CorrelationId]) -> Result<usize> {
        let mut responses = self.responses.write();
        Ok(correlation_ids
            .iter()
            .filter(|id| responses.remove(*id).is_some())
            .count())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let tables = self.waits.read();
        let mut responses = self.responses.write();
        let before = responses.len();
        responses.retain(|id, r| !r.is_expired(now) || tables.pins(id, now));
        Ok(before - responses.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CallbackSpec, DEFAULT_PUBLISHER};
    use chrono::Duration;
    use serde_json::json;

    fn cid(s: &str) -> CorrelationId {
        CorrelationId::try_new(s).unwrap()
    }

    fn make_wait(ids: &[&str], now: DateTime<Utc>) -> WaitInstance {
        WaitInstance::try_new(
            DEFAULT_PUBLISHER,
            CallbackSpec::new("log"),
            ids.iter().map(|s| cid(s)),
            now,
            now + Duration::days(30),
        )
        .unwrap()
    }

    fn make_response(id: &str, created_at: DateTime<Utc>) -> Response {
        Response::new(
            cid(id),
            json!(id),
            false,
            created_at,
            created_at + Duration::hours(24),
        )
    }

    #[tokio::test]
    async fn duplicate_response_is_rejected_and_first_kept() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let first = make_response("x", now);
        let mut second = make_response("x", now);
        second.payload = json!("other");

        assert_eq!(
            store.insert_response(&first).await.unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            store.insert_response(&second).await.unwrap(),
            InsertOutcome::Duplicate
        );

        let stored = store.get_responses(&[cid("x")], now).await.unwrap();
        assert_eq!(stored, vec![first]);
    }

    #[tokio::test]
    async fn find_waits_for_uses_the_correlation_index() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let a = make_wait(&["x", "y"], now);
        let b = make_wait(&["y"], now);
        let c = make_wait(&["z"], now);
        for w in [&a, &b, &c] {
            store.insert_wait(w).await.unwrap();
        }

        let found = store.find_waits_for(&[cid("y")], now).await.unwrap();
        let mut ids: Vec<_> = found.into_iter().map(|w| w.id).collect();
        ids.sort();
        let mut expected = vec![a.id.clone(), b.id.clone()];
        expected.sort();
        assert_eq!(ids, expected);

        let found = store
            .find_waits_for(&[cid("x"), cid("y")], now)
            .await
            .unwrap();
        assert_eq!(found.len(), 2, "joins are not repeated per matching id");
    }

    #[tokio::test]
    async fn claim_is_exclusive_until_lease_expires() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let wait = make_wait(&["x"], now);
        store.insert_wait(&wait).await.unwrap();

        let lease = now + Duration::seconds(60);
        assert!(store.try_claim(&wait.id, now, lease).await.unwrap());
        assert!(!store.try_claim(&wait.id, now, lease).await.unwrap());
        assert!(store
            .try_claim(&wait.id, lease, lease + Duration::seconds(60))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn release_makes_join_claimable_again() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let wait = make_wait(&["x"], now);
        store.insert_wait(&wait).await.unwrap();

        let lease = now + Duration::seconds(60);
        assert!(store.try_claim(&wait.id, now, lease).await.unwrap());
        assert!(store.release_claim(&wait.id, now).await.unwrap());
        assert!(store.try_claim(&wait.id, now, lease).await.unwrap());
    }

    #[tokio::test]
    async fn complete_only_transitions_once() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let wait = make_wait(&["x"], now);
        store.insert_wait(&wait).await.unwrap();

        let until = now + Duration::hours(1);
        assert!(store
            .complete(&wait.id, WaitStatus::Success, until)
            .await
            .unwrap());
        assert!(!store
            .complete(&wait.id, WaitStatus::Error, until)
            .await
            .unwrap());

        let stored = store.get_wait(&wait.id, now).await.unwrap().unwrap();
        assert_eq!(stored.status, WaitStatus::Success);
        assert_eq!(stored.valid_until, until);
        assert!(!store
            .try_claim(&wait.id, now, until)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn purge_expired_removes_joins_and_index_entries() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let mut expired = make_wait(&["x"], now);
        expired.valid_until = now - Duration::seconds(1);
        let live = make_wait(&["x"], now);
        store.insert_wait(&expired).await.unwrap();
        store.insert_wait(&live).await.unwrap();

        assert!(store.get_wait(&expired.id, now).await.unwrap().is_none());

        let purged = WaitStore::purge_expired(&store, now).await.unwrap();
        assert_eq!(purged.waits, 1);
        assert_eq!(store.wait_count(), 1);

        let found = store.find_waits_for(&[cid("x")], now).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, live.id);
    }

    #[tokio::test]
    async fn scan_responses_pages_oldest_first() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for (i, id) in ["c", "a", "b"].iter().enumerate() {
            store
                .insert_response(&make_response(id, now + Duration::seconds(i as i64)))
                .await
                .unwrap();
        }

        let first = store.scan_responses(None, 2, now).await.unwrap();
        let ids: Vec<_> = first.iter().map(|r| r.correlation_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);

        let cursor = ResponseCursor::from(first.last().unwrap());
        let second = store.scan_responses(Some(&cursor), 2, now).await.unwrap();
        let ids: Vec<_> = second.iter().map(|r| r.correlation_id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[tokio::test]
    async fn referenced_response_outlives_its_own_ttl() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.insert_wait(&make_wait(&["x", "y"], now)).await.unwrap();
        store.insert_response(&make_response("x", now)).await.unwrap();
        store.insert_response(&make_response("z", now)).await.unwrap();

        let later = now + Duration::hours(25);
        let held = store.get_responses(&[cid("x"), cid("z")], later).await.unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].correlation_id, cid("x"));
        assert_eq!(store.scan_responses(None, 10, later).await.unwrap().len(), 1);

        assert_eq!(ResponseStore::purge_expired(&store, later).await.unwrap(), 1);
        assert_eq!(store.response_count(), 1);

        let after_join = now + Duration::days(31);
        WaitStore::purge_expired(&store, after_join).await.unwrap();
        assert_eq!(ResponseStore::purge_expired(&store, after_join).await.unwrap(), 1);
        assert_eq!(store.response_count(), 0);
    }

    #[tokio::test]
    async fn delete_responses_counts_only_existing() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.insert_response(&make_response("x", now)).await.unwrap();

        let deleted = store.delete_responses(&[cid("x"), cid("y")]).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.response_count(), 0);
    }
}
