//! Queue transport port for dispatch hints.
//!
//! The contract is at-least-once: a received message stays invisible for a
//! visibility timeout and reappears unless it is acknowledged. Handlers must
//! therefore be idempotent, which the dispatcher guarantees through the
//! conditional claim.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::DispatchHint;
use crate::error::Result;

/// A hint handed to a consumer, with the bookkeeping needed to ack it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Transport-specific message ID.
    pub message_id: String,
    /// Topic the message was received from.
    pub topic: String,
    pub hint: DispatchHint,
    /// Delivery attempt, starting at 1.
    pub attempt: u32,
}

/// Publish/consume operations on named topics.
#[async_trait]
pub trait HintQueue: Send + Sync {
    /// Publish a hint on `topic`.
    async fn publish(&self, topic: &str, hint: &DispatchHint) -> Result<()>;

    /// Take the next visible message on `topic`, if any. Never blocks
    /// waiting for new messages; consumers poll.
    async fn receive(&self, topic: &str) -> Result<Option<Delivery>>;

    /// Acknowledge a delivery, removing the message.
    async fn ack(&self, delivery: &Delivery) -> Result<()>;

    /// Make a delivery visible again after `delay`.
    async fn requeue(&self, delivery: &Delivery, delay: Duration) -> Result<()>;
}
