//! Public wait/notify API.
//!
//! Registration and notification are plain store writes. Neither ever runs
//! a callback: `notify` only nudges the dispatcher with hints, and the
//! reconciler re-derives any hint that gets lost.

use std::slice;

use tracing::{debug, info};

use super::backend::Backend;
use crate::domain::{
    CallbackSpec, CorrelationId, DispatchHint, InsertOutcome, Response, Retention, WaitInstance,
    WaitInstanceId, WaitStatus, DEFAULT_PUBLISHER,
};
use crate::error::Result;

/// Result of [`WaitNotifyEngine::notify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// The response was stored and `hints` joins were nudged.
    Notified {
        correlation_id: CorrelationId,
        hints: usize,
    },
    /// A response already existed; nothing was written.
    AlreadyNotified { correlation_id: CorrelationId },
}

impl NotifyOutcome {
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::AlreadyNotified { .. })
    }

    #[must_use]
    pub fn correlation_id(&self) -> &CorrelationId {
        match self {
            Self::Notified { correlation_id, .. } | Self::AlreadyNotified { correlation_id } => {
                correlation_id
            }
        }
    }
}

/// Entry point used by components that wait on, or report, asynchronous
/// results.
#[derive(Clone)]
pub struct WaitNotifyEngine {
    backend: Backend,
    retention: Retention,
}

impl WaitNotifyEngine {
    #[must_use]
    pub fn new(backend: Backend, retention: Retention) -> Self {
        Self { backend, retention }
    }

    /// Register `callback` to run once every ID in `correlation_ids` has a
    /// response. Hints go to the default publisher.
    ///
    /// # Errors
    /// Returns an invalid-argument error if the set is empty or an ID is
    /// blank, or a store error if the join cannot be persisted.
    pub async fn wait_for_all<I>(
        &self,
        callback: CallbackSpec,
        correlation_ids: I,
    ) -> Result<WaitInstanceId>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.wait_for_all_on(DEFAULT_PUBLISHER, callback, correlation_ids)
            .await
    }

    /// Like [`wait_for_all`](Self::wait_for_all), publishing hints for the
    /// join on `publisher`.
    ///
    /// # Errors
    /// As [`wait_for_all`](Self::wait_for_all), plus an error for a blank
    /// publisher.
    pub async fn wait_for_all_on<I>(
        &self,
        publisher: &str,
        callback: CallbackSpec,
        correlation_ids: I,
    ) -> Result<WaitInstanceId>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let ids = correlation_ids
            .into_iter()
            .map(|id| CorrelationId::try_new(id))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let now = self.backend.clock.now();
        let wait = WaitInstance::try_new(
            publisher,
            callback,
            ids,
            now,
            self.retention.pending_wait_until(now),
        )?;
        self.backend.waits.insert_wait(&wait).await?;

        info!(
            wait_instance_id = %wait.id,
            publisher = %wait.publisher,
            callback = %wait.callback.kind,
            correlation_ids = wait.correlation_ids.len(),
            "Registered join"
        );
        Ok(wait.id)
    }

    /// Report the result for `correlation_id`.
    ///
    /// A second report for the same ID is a no-op returning
    /// [`NotifyOutcome::AlreadyNotified`]; the first payload is kept.
    ///
    /// # Errors
    /// Returns an invalid-argument error for a blank ID, or a store/queue
    /// error. When hint publication fails the response is already durable,
    /// so retrying the call is safe and the reconciler recovers the hint.
    pub async fn notify(
        &self,
        correlation_id: &str,
        payload: serde_json::Value,
        is_error: bool,
    ) -> Result<NotifyOutcome> {
        let correlation_id = CorrelationId::try_new(correlation_id)?;
        let now = self.backend.clock.now();
        let response = Response::new(
            correlation_id.clone(),
            payload,
            is_error,
            now,
            self.retention.response_until(now),
        );

        if self.backend.responses.insert_response(&response).await? == InsertOutcome::Duplicate {
            debug!(correlation_id = %correlation_id, "Response already recorded, ignoring notify");
            return Ok(NotifyOutcome::AlreadyNotified { correlation_id });
        }

        let waits = self
            .backend
            .waits
            .find_waits_for(slice::from_ref(&correlation_id), now)
            .await?;

        let mut hints = 0;
        for wait in waits.iter().filter(|w| w.status == WaitStatus::New) {
            self.backend
                .queue
                .publish(&wait.publisher, &DispatchHint::new(wait.id.clone()))
                .await?;
            hints += 1;
        }

        debug!(
            correlation_id = %correlation_id,
            is_error,
            hints,
            "Recorded response"
        );
        Ok(NotifyOutcome::Notified {
            correlation_id,
            hints,
        })
    }

    /// Report a successful result.
    ///
    /// # Errors
    /// See [`notify`](Self::notify).
    pub async fn done_with(
        &self,
        correlation_id: &str,
        payload: serde_json::Value,
    ) -> Result<NotifyOutcome> {
        self.notify(correlation_id, payload, false).await
    }

    /// Report a failed result.
    ///
    /// # Errors
    /// See [`notify`](Self::notify).
    pub async fn done_with_error(
        &self,
        correlation_id: &str,
        payload: serde_json::Value,
    ) -> Result<NotifyOutcome> {
        self.notify(correlation_id, payload, true).await
    }
}
