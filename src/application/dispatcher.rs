//! Hint consumer that runs join callbacks.
//!
//! # Per-hint state machine
//!
//! ```text
//! hint ──► try_claim ──(no match)──► Skipped
//!             │
//!             ▼
//!      load join + responses ──(incomplete)──► release claim ──► Incomplete
//!             │
//!             ▼
//!      invoke callback ──(fails)──► record WaitInstanceError
//!             │                             │
//!             ▼                             ▼
//!      complete(SUCCESS)             complete(ERROR)
//! ```
//!
//! The claim is a lease, not a lock. Another worker can claim the same join
//! once the lease lapses, so a callback that runs longer than the lease may
//! execute twice. Nothing renews the lease; keeping callbacks short is the
//! only mitigation, and an overrun is logged loudly when detected.
//!
//! A store error after the callback has run never releases the claim: the
//! hint is requeued but skipped until the lease lapses.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::backend::Backend;
use super::callback::CallbackRegistry;
use crate::domain::{
    any_error, DispatchHint, Retention, ResponseMap, WaitInstance, WaitInstanceError,
    WaitInstanceId, WaitStatus, DEFAULT_PUBLISHER,
};
use crate::error::Result;

/// Tuning for one dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// Topic this dispatcher consumes.
    pub topic: String,
    /// How long a claim keeps other workers away.
    pub lease: chrono::Duration,
    /// Sleep between polls of an empty topic.
    pub poll_interval: Duration,
    /// Deliveries of one message before it is dropped.
    pub max_attempts: u32,
    /// Delay before a failed delivery becomes visible again.
    pub retry_delay: Duration,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            topic: DEFAULT_PUBLISHER.to_string(),
            lease: chrono::Duration::seconds(60),
            poll_interval: Duration::from_millis(500),
            max_attempts: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// What handling one hint did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The callback ran and the join reached a terminal status.
    Completed { status: WaitStatus },
    /// Some responses are still missing; the claim was released.
    Incomplete { missing: usize },
    /// The join was already claimed, finished or gone.
    Skipped,
}

/// A claimed join after its responses were loaded.
enum Claimed {
    Gone,
    Incomplete(usize),
    Ready(WaitInstance, ResponseMap),
}

/// Handle for controlling a running dispatcher.
pub struct DispatcherHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Signal the dispatcher to stop and wait for its loop to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }
}

/// Queue consumer that claims ready joins and executes their callbacks.
pub struct EventDispatcher {
    backend: Backend,
    callbacks: Arc<CallbackRegistry>,
    retention: Retention,
    settings: DispatcherSettings,
}

impl EventDispatcher {
    #[must_use]
    pub fn new(
        backend: Backend,
        callbacks: Arc<CallbackRegistry>,
        retention: Retention,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            backend,
            callbacks,
            retention,
            settings,
        }
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.settings.topic
    }

    /// Evaluate the join named by `hint`.
    ///
    /// # Errors
    /// Returns store errors. An error before the callback runs releases the
    /// claim on a best-effort basis. Once the callback has run the claim is
    /// kept, so a redelivered hint is skipped until the lease lapses.
    pub async fn handle(&self, hint: &DispatchHint) -> Result<DispatchOutcome> {
        let id = &hint.wait_instance_id;
        let claimed_at = self.backend.clock.now();
        let lease_until = claimed_at + self.settings.lease;

        if !self
            .backend
            .waits
            .try_claim(id, claimed_at, lease_until)
            .await?
        {
            debug!(wait_instance_id = %id, "Join not claimable, dropping hint");
            return Ok(DispatchOutcome::Skipped);
        }

        let (wait, responses) = match self.load_claimed(id, claimed_at).await {
            Ok(Claimed::Ready(wait, responses)) => (wait, responses),
            Ok(Claimed::Gone) => return Ok(DispatchOutcome::Skipped),
            Ok(Claimed::Incomplete(missing)) => {
                return Ok(DispatchOutcome::Incomplete { missing })
            }
            Err(e) => {
                let now = self.backend.clock.now();
                if let Err(release_err) = self.backend.waits.release_claim(id, now).await {
                    warn!(
                        wait_instance_id = %id,
                        error = %release_err,
                        "Failed to release claim after error"
                    );
                }
                return Err(e);
            }
        };

        let outcome = self.run_callback(&wait, responses, claimed_at).await;
        if let Err(e) = &outcome {
            warn!(
                wait_instance_id = %wait.id,
                error = %e,
                "Completion failed after the callback ran; claim left to lapse"
            );
        }
        outcome
    }

    async fn load_claimed(
        &self,
        id: &WaitInstanceId,
        claimed_at: DateTime<Utc>,
    ) -> Result<Claimed> {
        let Some(wait) = self.backend.waits.get_wait(id, claimed_at).await? else {
            debug!(wait_instance_id = %id, "Claimed join disappeared");
            return Ok(Claimed::Gone);
        };

        let ids: Vec<_> = wait.correlation_ids.iter().cloned().collect();
        let responses: ResponseMap = self
            .backend
            .responses
            .get_responses(&ids, claimed_at)
            .await?
            .into_iter()
            .map(|r| (r.correlation_id.clone(), r))
            .collect();

        let missing = wait.missing(|id| responses.contains_key(id)).count();
        if missing > 0 {
            self.backend
                .waits
                .release_claim(&wait.id, self.backend.clock.now())
                .await?;
            debug!(
                wait_instance_id = %wait.id,
                missing,
                "Join incomplete, released claim"
            );
            return Ok(Claimed::Incomplete(missing));
        }

        Ok(Claimed::Ready(wait, responses))
    }

    async fn run_callback(
        &self,
        wait: &WaitInstance,
        responses: ResponseMap,
        claimed_at: DateTime<Utc>,
    ) -> Result<DispatchOutcome> {
        let is_error = any_error(&responses);
        let status = match self.callbacks.invoke(&wait.callback, &responses, is_error) {
            Ok(()) => WaitStatus::Success,
            Err(e) => {
                error!(
                    wait_instance_id = %wait.id,
                    callback = %wait.callback.kind,
                    error = %e,
                    "Callback failed"
                );
                self.record_failure(wait, responses, &e.to_string()).await;
                WaitStatus::Error
            }
        };

        let completed_at = self.backend.clock.now();
        let transitioned = self
            .backend
            .waits
            .complete(
                &wait.id,
                status,
                self.retention.terminal_wait_until(completed_at),
            )
            .await?;

        let held = completed_at - claimed_at;
        if held > self.settings.lease {
            warn!(
                wait_instance_id = %wait.id,
                held_ms = held.num_milliseconds(),
                lease_ms = self.settings.lease.num_milliseconds(),
                "Callback outlived its claim lease; another worker may have run it too"
            );
        }
        if !transitioned {
            warn!(
                wait_instance_id = %wait.id,
                "Join was already terminal when completing; callback ran more than once"
            );
        }

        info!(
            wait_instance_id = %wait.id,
            callback = %wait.callback.kind,
            status = %status,
            is_error,
            "Join completed"
        );
        Ok(DispatchOutcome::Completed { status })
    }

    async fn record_failure(&self, wait: &WaitInstance, responses: ResponseMap, detail: &str) {
        let now = self.backend.clock.now();
        let failure = WaitInstanceError::new(
            wait.id.clone(),
            responses,
            detail,
            now,
            self.retention.failure_until(now),
        );
        if let Err(e) = self.backend.waits.record_failure(&failure).await {
            warn!(
                wait_instance_id = %wait.id,
                error = %e,
                "Failed to persist callback failure record"
            );
        }
    }

    /// Receive and handle at most one message from the topic.
    ///
    /// Handled messages are acked whatever the outcome. A handler error
    /// requeues the message with a delay until `max_attempts` deliveries
    /// have been made, after which it is dropped; the reconciler re-derives
    /// the hint if the join is still ready.
    ///
    /// # Errors
    /// Returns queue errors and the handler error that triggered a requeue.
    pub async fn poll_once(&self) -> Result<Option<DispatchOutcome>> {
        let Some(delivery) = self.backend.queue.receive(&self.settings.topic).await? else {
            return Ok(None);
        };

        match self.handle(&delivery.hint).await {
            Ok(outcome) => {
                self.backend.queue.ack(&delivery).await?;
                Ok(Some(outcome))
            }
            Err(e) => {
                if delivery.attempt < self.settings.max_attempts {
                    warn!(
                        wait_instance_id = %delivery.hint.wait_instance_id,
                        attempt = delivery.attempt,
                        error = %e,
                        "Hint handling failed, requeueing"
                    );
                    self.backend
                        .queue
                        .requeue(&delivery, self.settings.retry_delay)
                        .await?;
                } else {
                    error!(
                        wait_instance_id = %delivery.hint.wait_instance_id,
                        attempt = delivery.attempt,
                        error = %e,
                        "Hint handling failed, giving up"
                    );
                    self.backend.queue.ack(&delivery).await?;
                }
                Err(e)
            }
        }
    }

    /// Drain the topic, returning the outcomes of every handled message.
    ///
    /// Handler errors are logged and skipped.
    pub async fn drain(&self) -> Vec<DispatchOutcome> {
        let mut outcomes = Vec::new();
        loop {
            match self.poll_once().await {
                Ok(Some(outcome)) => outcomes.push(outcome),
                Ok(None) => return outcomes,
                Err(e) => {
                    warn!(topic = %self.settings.topic, error = %e, "Dispatch iteration failed");
                }
            }
        }
    }

    /// Spawn the consume loop.
    ///
    /// The loop keeps polling while messages are available and sleeps for
    /// `poll_interval` when the topic is empty or an iteration fails.
    pub fn start(self) -> DispatcherHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let dispatcher = Arc::new(self);

        let task = tokio::spawn(async move {
            info!(topic = %dispatcher.settings.topic, "Dispatcher started");
            loop {
                let idle = match dispatcher.poll_once().await {
                    Ok(Some(_)) => false,
                    Ok(None) => true,
                    Err(e) => {
                        warn!(
                            topic = %dispatcher.settings.topic,
                            error = %e,
                            "Dispatch iteration failed"
                        );
                        true
                    }
                };

                if idle {
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = tokio::time::sleep(dispatcher.settings.poll_interval) => {}
                    }
                } else if shutdown_rx.try_recv().is_ok() {
                    break;
                }
            }
            info!(topic = %dispatcher.settings.topic, "Dispatcher stopped");
        });

        DispatcherHandle { shutdown_tx, task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CallbackSpec;
    use crate::error::CallbackError;
    use crate::port::{Clock, NotifyCallback};
    use crate::testkit::clock::ManualClock;
    use crate::testkit::config;
    use crate::testkit::harness::{MemoryHarness, RECORDING_KIND};
    use serde_json::json;

    #[tokio::test]
    async fn incomplete_join_releases_its_claim() {
        let harness = MemoryHarness::new();
        let id = harness
            .engine
            .wait_for_all(CallbackSpec::new(RECORDING_KIND), ["x", "y"])
            .await
            .unwrap();
        harness.engine.done_with("x", json!(1)).await.unwrap();

        let outcomes = harness.dispatcher.drain().await;
        assert_eq!(outcomes, vec![DispatchOutcome::Incomplete { missing: 1 }]);
        assert_eq!(harness.callback.total(), 0);

        let now = harness.clock.now();
        let wait = harness.backend.waits.get_wait(&id, now).await.unwrap().unwrap();
        assert_eq!(wait.status, WaitStatus::New);
        assert!(wait.is_claimable(now));
    }

    #[tokio::test]
    async fn hint_for_terminal_join_is_skipped() {
        let harness = MemoryHarness::new();
        let id = harness
            .engine
            .wait_for_all(CallbackSpec::new(RECORDING_KIND), ["x"])
            .await
            .unwrap();
        harness.engine.done_with("x", json!(1)).await.unwrap();
        harness.dispatcher.drain().await;

        let outcome = harness
            .dispatcher
            .handle(&DispatchHint::new(id))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Skipped);
        assert_eq!(harness.callback.total(), 1);
    }

    #[tokio::test]
    async fn hint_for_unknown_join_is_skipped() {
        let harness = MemoryHarness::new();
        let outcome = harness
            .dispatcher
            .handle(&DispatchHint::new("missing".into()))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Skipped);
    }

    #[tokio::test]
    async fn failing_callback_records_error_and_marks_join_error() {
        let harness = MemoryHarness::new();
        harness.callback.fail_with("downstream unavailable");
        let id = harness
            .engine
            .wait_for_all(CallbackSpec::new(RECORDING_KIND), ["x"])
            .await
            .unwrap();
        harness.engine.done_with("x", json!({"n": 1})).await.unwrap();

        let outcomes = harness.dispatcher.drain().await;
        assert_eq!(
            outcomes,
            vec![DispatchOutcome::Completed {
                status: WaitStatus::Error
            }]
        );

        let failures = harness.backend.waits.failures_for(&id).await.unwrap();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].detail.contains("downstream unavailable"));
        assert_eq!(failures[0].responses.len(), 1);
    }

    #[tokio::test]
    async fn unknown_callback_kind_marks_join_error() {
        let harness = MemoryHarness::new();
        let id = harness
            .engine
            .wait_for_all(CallbackSpec::new("unregistered"), ["x"])
            .await
            .unwrap();
        harness.engine.done_with("x", json!(1)).await.unwrap();

        harness.dispatcher.drain().await;

        let now = harness.clock.now();
        let wait = harness.backend.waits.get_wait(&id, now).await.unwrap().unwrap();
        assert_eq!(wait.status, WaitStatus::Error);
        let failures = harness.backend.waits.failures_for(&id).await.unwrap();
        assert!(failures[0].detail.contains("unregistered"));
    }

    #[tokio::test]
    async fn completion_shortens_ttl_to_terminal_window() {
        let harness = MemoryHarness::new();
        let id = harness
            .engine
            .wait_for_all(CallbackSpec::new(RECORDING_KIND), ["x"])
            .await
            .unwrap();
        harness.engine.done_with("x", json!(1)).await.unwrap();
        harness.dispatcher.drain().await;

        let now = harness.clock.now();
        let wait = harness.backend.waits.get_wait(&id, now).await.unwrap().unwrap();
        assert_eq!(wait.status, WaitStatus::Success);
        assert_eq!(wait.valid_until, now + harness.retention.terminal_wait);
    }

    #[tokio::test]
    async fn failed_completion_keeps_the_claim_and_does_not_rerun_callback() {
        let harness = MemoryHarness::new();
        let (faulty, backend) = harness.faulty_backend();
        let dispatcher = harness.dispatcher_with(backend);
        let id = harness
            .engine
            .wait_for_all(CallbackSpec::new(RECORDING_KIND), ["x"])
            .await
            .unwrap();
        harness.engine.done_with("x", json!(1)).await.unwrap();

        faulty.fail_complete(true);
        assert!(dispatcher.poll_once().await.is_err());
        assert_eq!(harness.callback.total(), 1);

        let now = harness.clock.now();
        let wait = harness.backend.waits.get_wait(&id, now).await.unwrap().unwrap();
        assert_eq!(wait.status, WaitStatus::New);
        assert!(!wait.is_claimable(now));

        faulty.fail_complete(false);
        let redelivered = dispatcher.poll_once().await.unwrap();
        assert_eq!(redelivered, Some(DispatchOutcome::Skipped));
        assert_eq!(harness.callback.total(), 1);
        assert!(harness.queue.is_empty(DEFAULT_PUBLISHER));
    }

    struct SlowCallback {
        clock: Arc<ManualClock>,
    }

    impl NotifyCallback for SlowCallback {
        fn notify(
            &self,
            _: &CallbackSpec,
            _: &ResponseMap,
        ) -> std::result::Result<(), CallbackError> {
            self.clock.advance(chrono::Duration::minutes(2));
            Ok(())
        }

        fn notify_error(
            &self,
            _: &CallbackSpec,
            _: &ResponseMap,
        ) -> std::result::Result<(), CallbackError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn callback_outliving_its_lease_still_completes_the_join() {
        let harness = MemoryHarness::new();
        let mut registry = CallbackRegistry::new();
        registry.register(
            "slow",
            Arc::new(SlowCallback {
                clock: harness.clock.clone(),
            }),
        );
        let dispatcher = EventDispatcher::new(
            harness.backend.clone(),
            Arc::new(registry),
            harness.retention,
            config::dispatcher(),
        );
        let id = harness
            .engine
            .wait_for_all(CallbackSpec::new("slow"), ["x"])
            .await
            .unwrap();
        harness.engine.done_with("x", json!(1)).await.unwrap();
        let claimed_at = harness.clock.now();

        let outcome = dispatcher
            .handle(&DispatchHint::new(id.clone()))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Completed {
                status: WaitStatus::Success
            }
        );

        let now = harness.clock.now();
        assert!(now - claimed_at > config::dispatcher().lease);
        let wait = harness.backend.waits.get_wait(&id, now).await.unwrap().unwrap();
        assert_eq!(wait.status, WaitStatus::Success);
        assert_eq!(wait.valid_until, now + harness.retention.terminal_wait);
    }

    #[tokio::test]
    async fn start_and_shutdown_processes_pending_hints() {
        let harness = MemoryHarness::new();
        harness
            .engine
            .wait_for_all(CallbackSpec::new(RECORDING_KIND), ["x"])
            .await
            .unwrap();
        harness.engine.done_with("x", json!(1)).await.unwrap();

        let handle = harness.new_dispatcher().start();
        for _ in 0..50 {
            if harness.callback.total() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.shutdown().await;

        assert_eq!(harness.callback.success_count(), 1);
    }
}
