//! Persistence ports for joins and responses.
//!
//! Both traits are expressed in terms of single-document operations:
//! unique inserts, lookups through the correlation-ID index, and conditional
//! updates whose matched count decides who wins a race. There are no
//! multi-document transactions; cross-document consistency comes from the
//! hint and reconciliation protocol.
//!
//! Documents past their `valid_until` must be treated as absent by every
//! read, and are physically removed by `purge_expired`. The one exception is
//! a response that a live join still waits on: its `valid_until` does not
//! apply until no live join references it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    CorrelationId, InsertOutcome, Response, ResponseCursor, WaitInstance, WaitInstanceError,
    WaitInstanceId, WaitStatus,
};
use crate::error::Result;

/// Storage operations for the wait registry.
#[async_trait]
pub trait WaitStore: Send + Sync {
    /// Persist a new join together with its correlation index entries.
    async fn insert_wait(&self, wait: &WaitInstance) -> Result<()>;

    /// Get a join by ID.
    async fn get_wait(&self, id: &WaitInstanceId, now: DateTime<Utc>)
        -> Result<Option<WaitInstance>>;

    /// All live joins whose correlation set contains any of `correlation_ids`.
    ///
    /// Joins of every status are returned; callers filter as needed.
    async fn find_waits_for(
        &self,
        correlation_ids: &[CorrelationId],
        now: DateTime<Utc>,
    ) -> Result<Vec<WaitInstance>>;

    /// Claim a join for processing.
    ///
    /// Succeeds only if the join is NEW and `claim_lease_until <= now`, in
    /// which case `claim_lease_until` becomes `lease_until`. Returns whether
    /// the conditional update matched.
    async fn try_claim(
        &self,
        id: &WaitInstanceId,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<bool>;

    /// Give up a claim on a NEW join so it can be claimed again immediately.
    async fn release_claim(&self, id: &WaitInstanceId, now: DateTime<Utc>) -> Result<bool>;

    /// Move a NEW join to a terminal status and shorten its TTL.
    ///
    /// Returns `false` if the join was no longer NEW.
    async fn complete(
        &self,
        id: &WaitInstanceId,
        status: WaitStatus,
        valid_until: DateTime<Utc>,
    ) -> Result<bool>;

    /// Persist a callback failure record.
    async fn record_failure(&self, failure: &WaitInstanceError) -> Result<()>;

    /// Failure records for a join, oldest first.
    async fn failures_for(&self, id: &WaitInstanceId) -> Result<Vec<WaitInstanceError>>;

    /// Delete joins and failure records past their TTL.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<PurgedWaits>;
}

/// Counts removed by [`WaitStore::purge_expired`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgedWaits {
    pub waits: usize,
    pub failures: usize,
}

/// Storage operations for the response table.
#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// Insert a response unless one already exists for its correlation ID.
    ///
    /// Only a uniqueness clash on the correlation ID yields
    /// [`InsertOutcome::Duplicate`]; any other failure is an error. An
    /// existing response is never overwritten.
    async fn insert_response(&self, response: &Response) -> Result<InsertOutcome>;

    /// Live responses for the given correlation IDs. Missing IDs are skipped.
    ///
    /// A response referenced by a live join is live regardless of its own
    /// `valid_until`.
    async fn get_responses(
        &self,
        correlation_ids: &[CorrelationId],
        now: DateTime<Utc>,
    ) -> Result<Vec<Response>>;

    /// Page through live responses ordered by `(created_at, correlation_id)`.
    async fn scan_responses(
        &self,
        after: Option<&ResponseCursor>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Response>>;

    /// Delete responses by correlation ID. Returns the number removed.
    async fn delete_responses(&self, correlation_ids: &[CorrelationId]) -> Result<usize>;

    /// Delete responses past their TTL that no live join references.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}
