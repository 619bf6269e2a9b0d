//! In-memory hint queue implementation for testing.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No persistence, no distribution
//! - **Single-process only**: Messages are not visible across process boundaries

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::domain::DispatchHint;
use crate::error::{Error, Result};
use crate::port::{Clock, Delivery, HintQueue, SystemClock};

/// Entry held on a topic.
#[derive(Debug, Clone)]
struct QueuedHint {
    message_id: String,
    hint: DispatchHint,
    attempts: u32,
    visible_at: DateTime<Utc>,
}

/// In-memory at-least-once queue.
///
/// Received messages stay on their topic, invisible until the visibility
/// timeout passes, so a consumer that never acks sees them again.
pub struct MemoryHintQueue {
    topics: Mutex<HashMap<String, Vec<QueuedHint>>>,
    visibility_timeout: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl MemoryHintQueue {
    /// Create a queue using the wall clock.
    #[must_use]
    pub fn new(visibility_timeout: Duration) -> Self {
        Self::with_clock(visibility_timeout, Arc::new(SystemClock))
    }

    /// Create a queue driven by the given clock.
    #[must_use]
    pub fn with_clock(visibility_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            visibility_timeout: chrono::Duration::from_std(visibility_timeout)
                .unwrap_or(chrono::Duration::seconds(60)),
            clock,
        }
    }

    /// Messages on `topic`, visible or in flight.
    pub fn len(&self, topic: &str) -> usize {
        self.topics.lock().get(topic).map_or(0, Vec::len)
    }

    /// True when `topic` holds no messages.
    pub fn is_empty(&self, topic: &str) -> bool {
        self.len(topic) == 0
    }

    /// Hints currently on `topic`, in publish order.
    pub fn pending(&self, topic: &str) -> Vec<DispatchHint> {
        self.topics
            .lock()
            .get(topic)
            .map(|q| q.iter().map(|e| e.hint.clone()).collect())
            .unwrap_or_default()
    }

    /// Drop every message on every topic.
    pub fn clear(&self) {
        self.topics.lock().clear();
    }
}

#[async_trait]
impl HintQueue for MemoryHintQueue {
    async fn publish(&self, topic: &str, hint: &DispatchHint) -> Result<()> {
        let entry = QueuedHint {
            message_id: uuid::Uuid::new_v4().to_string(),
            hint: hint.clone(),
            attempts: 0,
            visible_at: self.clock.now(),
        };
        self.topics
            .lock()
            .entry(topic.to_string())
            .or_default()
            .push(entry);
        Ok(())
    }

    async fn receive(&self, topic: &str) -> Result<Option<Delivery>> {
        let now = self.clock.now();
        let mut topics = self.topics.lock();
        let Some(queue) = topics.get_mut(topic) else {
            return Ok(None);
        };

        let Some(entry) = queue.iter_mut().find(|e| e.visible_at <= now) else {
            return Ok(None);
        };
        entry.attempts += 1;
        entry.visible_at = now + self.visibility_timeout;

        Ok(Some(Delivery {
            message_id: entry.message_id.clone(),
            topic: topic.to_string(),
            hint: entry.hint.clone(),
            attempt: entry.attempts,
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        if let Some(queue) = self.topics.lock().get_mut(&delivery.topic) {
            queue.retain(|e| e.message_id != delivery.message_id);
        }
        Ok(())
    }

    async fn requeue(&self, delivery: &Delivery, delay: Duration) -> Result<()> {
        let delay = chrono::Duration::from_std(delay).map_err(|e| Error::Queue(e.to_string()))?;
        let visible_at = self.clock.now() + delay;
        let mut topics = self.topics.lock();
        let entry = topics
            .get_mut(&delivery.topic)
            .and_then(|q| q.iter_mut().find(|e| e.message_id == delivery.message_id));
        match entry {
            Some(entry) => {
                entry.visible_at = visible_at;
                Ok(())
            }
            None => Err(Error::Queue(format!(
                "message {} is not on topic {}",
                delivery.message_id, delivery.topic
            ))),
        }
    }
}
