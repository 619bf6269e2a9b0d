//! Background repair of lost hints and orphaned responses.
//!
//! Each pass, run under a distributed lock so only one process reconciles
//! at a time:
//!
//! 1. Purges joins, failure records and responses past their TTL.
//! 2. Walks live responses oldest first in keyset-paginated batches. For
//!    each batch it looks up the joins referencing those correlation IDs.
//!    - A claimable NEW join with every response present gets a fresh hint
//!      on its publisher, at most once per pass.
//!    - A response referenced by no live join and older than the orphan
//!      grace period is deleted.
//!
//! A failing batch is logged and skipped; the pass moves on to the next one.
//!
//! The scan position survives between passes. A pass resumes where the
//! previous one stopped and wraps to the oldest response after reaching the
//! newest, so every response is visited even when one pass cannot cover
//! them all.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::Backend;
use crate::domain::{CorrelationId, DispatchHint, Response, ResponseCursor, WaitInstanceId};
use crate::error::Result;
use crate::port::DistributedLock;

/// Tuning for the reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    /// Time between passes.
    pub interval: Duration,
    /// Responses read per batch.
    pub batch_size: usize,
    /// Upper bound on batches per pass.
    pub max_batches: usize,
    /// Minimum age before an unreferenced response is deleted.
    pub orphan_grace: chrono::Duration,
    /// Responses deleted per store call.
    pub delete_batch_size: usize,
    pub lock_key: String,
    pub lock_lease: Duration,
    /// Identity recorded as the lock owner.
    pub owner: String,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            batch_size: 1000,
            max_batches: 10,
            orphan_grace: chrono::Duration::seconds(30),
            delete_batch_size: 500,
            lock_key: "waitnotify-reconciler".to_string(),
            lock_lease: Duration::from_secs(60),
            owner: format!("reconciler-{}", uuid::Uuid::new_v4()),
        }
    }
}

/// Counters for one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub batches: usize,
    pub scanned: usize,
    pub hinted: usize,
    pub orphans_deleted: usize,
    pub expired_waits: usize,
    pub expired_failures: usize,
    pub expired_responses: usize,
    pub failed_batches: usize,
}

#[derive(Debug, Default)]
struct BatchReport {
    hinted: usize,
    orphans_deleted: usize,
}

/// Handle for controlling a running reconciler.
pub struct ReconcilerHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    /// Signal the reconciler to stop and wait for its loop to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }
}

/// Periodic repair pass over the response table.
///
/// Re-publishes hints for ready joins whose hint was lost and deletes
/// responses no join will ever consume. Safe to run in every process; the
/// distributed lock keeps passes from overlapping.
pub struct Reconciler {
    backend: Backend,
    lock: Arc<dyn DistributedLock>,
    settings: ReconcilerSettings,
    /// Last response visited by the previous pass.
    cursor: Mutex<Option<ResponseCursor>>,
}

impl Reconciler {
    #[must_use]
    pub fn new(
        backend: Backend,
        lock: Arc<dyn DistributedLock>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            backend,
            lock,
            settings,
            cursor: Mutex::new(None),
        }
    }

    /// Run one pass if the reconciler lock can be taken.
    ///
    /// Returns `None` when another owner holds the lock.
    ///
    /// # Errors
    /// Returns lock errors, or the error that aborted the pass. The lock is
    /// released either way.
    pub async fn tick(&self) -> Result<Option<ReconcileReport>> {
        let Some(lease) = self
            .lock
            .try_acquire(
                &self.settings.lock_key,
                &self.settings.owner,
                self.settings.lock_lease,
            )
            .await?
        else {
            debug!(key = %self.settings.lock_key, "Reconciler lock held elsewhere, skipping pass");
            return Ok(None);
        };

        let result = self.reconcile().await;

        match self.lock.release(&lease).await {
            Ok(true) => {}
            Ok(false) => warn!(
                key = %lease.key,
                "Reconciler lock expired before release; pass outlived its lease"
            ),
            Err(e) => warn!(key = %lease.key, error = %e, "Failed to release reconciler lock"),
        }

        result.map(Some)
    }

    /// Run one pass without taking the lock.
    ///
    /// # Errors
    /// Returns an error if a response page cannot be read. Purge and
    /// per-batch failures are logged and counted instead.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let now = self.backend.clock.now();
        let mut report = ReconcileReport::default();
        self.purge(now, &mut report).await;

        let start = self.cursor.lock().clone();
        let mut cursor = start.clone();
        let mut wrapped = start.is_none();
        let mut hinted = HashSet::new();

        while report.batches < self.settings.max_batches {
            let page = self
                .backend
                .responses
                .scan_responses(cursor.as_ref(), self.settings.batch_size, now)
                .await?;

            if let Some(last) = page.last() {
                let position = ResponseCursor::from(last);
                report.batches += 1;
                report.scanned += page.len();

                match self.reconcile_batch(&page, now, &mut hinted).await {
                    Ok(batch) => {
                        report.hinted += batch.hinted;
                        report.orphans_deleted += batch.orphans_deleted;
                    }
                    Err(e) => {
                        report.failed_batches += 1;
                        warn!(batch = report.batches, error = %e, "Reconcile batch failed");
                    }
                }

                let lapped = wrapped && start.as_ref().is_some_and(|s| &position >= s);
                cursor = Some(position);
                if lapped {
                    break;
                }
            }

            if page.is_empty() || page.len() < self.settings.batch_size {
                cursor = None;
                if wrapped {
                    break;
                }
                wrapped = true;
            }
        }
        *self.cursor.lock() = cursor;

        info!(
            batches = report.batches,
            scanned = report.scanned,
            hinted = report.hinted,
            orphans_deleted = report.orphans_deleted,
            expired_waits = report.expired_waits,
            expired_responses = report.expired_responses,
            failed_batches = report.failed_batches,
            "Reconcile pass finished"
        );
        Ok(report)
    }

    async fn purge(&self, now: DateTime<Utc>, report: &mut ReconcileReport) {
        match self.backend.waits.purge_expired(now).await {
            Ok(purged) => {
                report.expired_waits = purged.waits;
                report.expired_failures = purged.failures;
            }
            Err(e) => warn!(error = %e, "Failed to purge expired joins"),
        }
        match self.backend.responses.purge_expired(now).await {
            Ok(count) => report.expired_responses = count,
            Err(e) => warn!(error = %e, "Failed to purge expired responses"),
        }
    }

    async fn reconcile_batch(
        &self,
        page: &[Response],
        now: DateTime<Utc>,
        hinted: &mut HashSet<WaitInstanceId>,
    ) -> Result<BatchReport> {
        let ids: Vec<CorrelationId> = page.iter().map(|r| r.correlation_id.clone()).collect();
        let waits = self.backend.waits.find_waits_for(&ids, now).await?;
        let mut report = BatchReport::default();

        let referenced: BTreeSet<&CorrelationId> =
            waits.iter().flat_map(|w| w.correlation_ids.iter()).collect();

        for wait in waits.iter().filter(|w| w.is_claimable(now)) {
            if hinted.contains(&wait.id) {
                continue;
            }
            let wanted: Vec<_> = wait.correlation_ids.iter().cloned().collect();
            let present: BTreeSet<CorrelationId> = self
                .backend
                .responses
                .get_responses(&wanted, now)
                .await?
                .into_iter()
                .map(|r| r.correlation_id)
                .collect();
            if wait.missing(|id| present.contains(id)).next().is_some() {
                continue;
            }

            self.backend
                .queue
                .publish(&wait.publisher, &DispatchHint::new(wait.id.clone()))
                .await?;
            hinted.insert(wait.id.clone());
            report.hinted += 1;
            debug!(wait_instance_id = %wait.id, publisher = %wait.publisher, "Re-published hint");
        }

        let cutoff = now - self.settings.orphan_grace;
        let orphans: Vec<CorrelationId> = page
            .iter()
            .filter(|r| r.created_at < cutoff && !referenced.contains(&r.correlation_id))
            .map(|r| r.correlation_id.clone())
            .collect();

        for chunk in orphans.chunks(self.settings.delete_batch_size.max(1)) {
            report.orphans_deleted += self.backend.responses.delete_responses(chunk).await?;
        }
        if report.orphans_deleted > 0 {
            debug!(count = report.orphans_deleted, "Deleted orphaned responses");
        }

        Ok(report)
    }

    /// Spawn the periodic reconcile loop.
    pub fn start(self) -> ReconcilerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let reconciler = Arc::new(self);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(reconciler.settings.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(
                interval_ms = reconciler.settings.interval.as_millis() as u64,
                owner = %reconciler.settings.owner,
                "Reconciler started"
            );

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = reconciler.tick().await {
                            warn!(error = %e, "Reconcile pass failed");
                        }
                    }
                }
            }
            info!("Reconciler stopped");
        });

        ReconcilerHandle { shutdown_tx, task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CallbackSpec;
    use crate::port::Clock;
    use crate::testkit::harness::{MemoryHarness, RECORDING_KIND};
    use serde_json::json;

    #[tokio::test]
    async fn tick_skips_when_lock_is_held() {
        let harness = MemoryHarness::new();
        let reconciler = harness.reconciler();
        let _held = harness
            .lock
            .try_acquire(
                &ReconcilerSettings::default().lock_key,
                "someone-else",
                Duration::from_secs(60),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(reconciler.tick().await.unwrap(), None);
    }

    #[tokio::test]
    async fn tick_releases_lock_after_pass() {
        let harness = MemoryHarness::new();
        let reconciler = harness.reconciler();

        assert!(reconciler.tick().await.unwrap().is_some());
        assert!(reconciler.tick().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn ready_join_is_hinted_once_per_pass() {
        let harness = MemoryHarness::new();
        harness
            .engine
            .wait_for_all(CallbackSpec::new(RECORDING_KIND), ["x", "y"])
            .await
            .unwrap();
        harness.engine.done_with("x", json!(1)).await.unwrap();
        harness.engine.done_with("y", json!(2)).await.unwrap();
        harness.queue.clear();

        let mut settings = harness.reconciler_settings();
        settings.batch_size = 1;
        let report = harness.reconciler_with(settings).reconcile().await.unwrap();

        assert_eq!(report.batches, 2);
        assert_eq!(report.hinted, 1);
        assert_eq!(harness.queue.len(crate::domain::DEFAULT_PUBLISHER), 1);
    }

    #[tokio::test]
    async fn incomplete_join_is_not_hinted() {
        let harness = MemoryHarness::new();
        harness
            .engine
            .wait_for_all(CallbackSpec::new(RECORDING_KIND), ["x", "y"])
            .await
            .unwrap();
        harness.engine.done_with("x", json!(1)).await.unwrap();
        harness.queue.clear();

        let report = harness.reconciler().reconcile().await.unwrap();
        assert_eq!(report.hinted, 0);
        assert_eq!(report.orphans_deleted, 0);
    }

    #[tokio::test]
    async fn orphan_is_kept_within_grace_and_deleted_after() {
        let harness = MemoryHarness::new();
        harness.engine.done_with("stray", json!(1)).await.unwrap();
        let reconciler = harness.reconciler();

        let report = reconciler.reconcile().await.unwrap();
        assert_eq!(report.orphans_deleted, 0);
        assert_eq!(harness.store.response_count(), 1);

        harness.clock.advance(chrono::Duration::seconds(31));
        let report = reconciler.reconcile().await.unwrap();
        assert_eq!(report.orphans_deleted, 1);
        assert_eq!(harness.store.response_count(), 0);
    }

    #[tokio::test]
    async fn passes_resume_where_the_previous_one_stopped() {
        let harness = MemoryHarness::new();
        let ids: Vec<String> = (0..6).map(|i| format!("r{i}")).collect();
        let mut pending = ids.clone();
        pending.push("never".to_string());
        harness
            .engine
            .wait_for_all(CallbackSpec::new(RECORDING_KIND), pending)
            .await
            .unwrap();
        for id in &ids {
            harness.engine.done_with(id, json!(1)).await.unwrap();
        }
        harness.clock.advance(chrono::Duration::seconds(1));
        harness.engine.done_with("stray", json!(1)).await.unwrap();
        harness.clock.advance(chrono::Duration::seconds(31));

        let mut settings = harness.reconciler_settings();
        settings.batch_size = 2;
        settings.max_batches = 2;
        let reconciler = harness.reconciler_with(settings);

        let first = reconciler.reconcile().await.unwrap();
        assert_eq!(first.scanned, 4);
        assert_eq!(first.orphans_deleted, 0);

        let second = reconciler.reconcile().await.unwrap();
        assert_eq!(second.scanned, 3);
        assert_eq!(second.orphans_deleted, 1);
        assert_eq!(harness.store.response_count(), 6);

        let third = reconciler.reconcile().await.unwrap();
        assert_eq!(third.scanned, 4, "wrapped back to the oldest response");
    }

    #[tokio::test]
    async fn failed_batch_does_not_abort_the_pass() {
        let harness = MemoryHarness::new();
        harness
            .engine
            .wait_for_all(CallbackSpec::new(RECORDING_KIND), ["a"])
            .await
            .unwrap();
        let b = harness
            .engine
            .wait_for_all(CallbackSpec::new(RECORDING_KIND), ["b"])
            .await
            .unwrap();
        harness.engine.done_with("a", json!(1)).await.unwrap();
        harness.clock.advance(chrono::Duration::seconds(1));
        harness.engine.done_with("b", json!(2)).await.unwrap();
        harness.queue.clear();

        let (faulty, backend) = harness.faulty_backend();
        faulty.fail_lookup_for("a");
        let mut settings = harness.reconciler_settings();
        settings.batch_size = 1;
        let report = Reconciler::new(backend, harness.lock.clone(), settings)
            .reconcile()
            .await
            .unwrap();

        assert_eq!(report.batches, 2);
        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.hinted, 1);
        assert_eq!(
            harness.queue.pending(crate::domain::DEFAULT_PUBLISHER),
            vec![DispatchHint::new(b)]
        );
    }

    #[tokio::test]
    async fn orphans_are_deleted_in_capped_chunks() {
        let harness = MemoryHarness::new();
        for i in 0..5 {
            harness
                .engine
                .done_with(&format!("stray-{i}"), json!(i))
                .await
                .unwrap();
        }
        harness.clock.advance(chrono::Duration::seconds(31));

        let (faulty, backend) = harness.faulty_backend();
        let mut settings = harness.reconciler_settings();
        settings.delete_batch_size = 2;
        let report = Reconciler::new(backend, harness.lock.clone(), settings)
            .reconcile()
            .await
            .unwrap();

        assert_eq!(report.orphans_deleted, 5);
        assert_eq!(faulty.delete_calls(), 3);
        assert_eq!(harness.store.response_count(), 0);
    }

    #[tokio::test]
    async fn expired_records_are_purged() {
        let harness = MemoryHarness::new();
        harness
            .engine
            .wait_for_all(CallbackSpec::new(RECORDING_KIND), ["x"])
            .await
            .unwrap();
        harness.engine.done_with("x", json!(1)).await.unwrap();
        harness.dispatcher.drain().await;

        harness.clock.advance(chrono::Duration::hours(2));
        let now = harness.clock.now();
        let report = harness.reconciler().reconcile().await.unwrap();

        assert_eq!(report.expired_waits, 1);
        assert_eq!(harness.store.wait_count(), 0);
        assert!(harness
            .backend
            .responses
            .get_responses(&[CorrelationId::try_new("x").unwrap()], now)
            .await
            .unwrap()
            .is_empty());
    }
}
