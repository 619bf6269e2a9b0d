//! SQLite-backed hint queue.
//!
//! Messages live in `hint_messages`. Receiving a message pushes its
//! `visible_at` forward by the visibility timeout instead of deleting it, so
//! a consumer that crashes before acking leaves the message to be delivered
//! again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use diesel::prelude::*;

use crate::adapter::outbound::sqlite::database::connection::DbPool;
use crate::adapter::outbound::sqlite::database::model::{
    encode_time, HintMessageRow, NewHintMessageRow,
};
use crate::adapter::outbound::sqlite::database::schema::hint_messages;
use crate::domain::DispatchHint;
use crate::error::{Error, Result};
use crate::port::{Clock, Delivery, HintQueue, SystemClock};

pub struct SqliteHintQueue {
    pool: DbPool,
    visibility_timeout: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl SqliteHintQueue {
    /// Create a queue using the wall clock.
    ///
    /// # Errors
    /// Returns an error if `visibility_timeout` is out of range.
    pub fn new(pool: DbPool, visibility_timeout: Duration) -> Result<Self> {
        Self::with_clock(pool, visibility_timeout, Arc::new(SystemClock))
    }

    /// # Errors
    /// Returns an error if `visibility_timeout` is out of range.
    pub fn with_clock(
        pool: DbPool,
        visibility_timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Ok(Self {
            pool,
            visibility_timeout: to_chrono(visibility_timeout)?,
            clock,
        })
    }

    /// Messages on `topic`, visible or in flight.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn depth(&self, topic: &str) -> Result<i64> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        hint_messages::table
            .filter(hint_messages::topic.eq(topic))
            .count()
            .get_result(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))
    }
}

fn to_chrono(d: Duration) -> Result<chrono::Duration> {
    chrono::Duration::from_std(d).map_err(|e| Error::Queue(e.to_string()))
}

fn message_id(delivery: &Delivery) -> Result<i32> {
    delivery
        .message_id
        .parse()
        .map_err(|_| Error::Queue(format!("invalid message id '{}'", delivery.message_id)))
}

#[async_trait]
impl HintQueue for SqliteHintQueue {
    async fn publish(&self, topic: &str, hint: &DispatchHint) -> Result<()> {
        let now = encode_time(self.clock.now());
        let row = NewHintMessageRow {
            topic: topic.to_string(),
            payload: serde_json::to_string(hint)?,
            attempts: 0,
            visible_at: now.clone(),
            created_at: now,
        };

        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        diesel::insert_into(hint_messages::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn receive(&self, topic: &str) -> Result<Option<Delivery>> {
        let now = self.clock.now();
        let now_s = encode_time(now);
        let hidden_until = encode_time(now + self.visibility_timeout);

        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let row = conn
            .immediate_transaction(|conn| {
                let next: Option<HintMessageRow> = hint_messages::table
                    .filter(hint_messages::topic.eq(topic))
                    .filter(hint_messages::visible_at.le(now_s.as_str()))
                    .order(hint_messages::id.asc())
                    .select(HintMessageRow::as_select())
                    .first(conn)
                    .optional()?;

                if let Some(row) = &next {
                    diesel::update(hint_messages::table.find(row.id))
                        .set((
                            hint_messages::attempts.eq(row.attempts + 1),
                            hint_messages::visible_at.eq(hidden_until.as_str()),
                        ))
                        .execute(conn)?;
                }
                Ok::<_, diesel::result::Error>(next)
            })
            .map_err(|e| Error::Database(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(Delivery {
            message_id: row.id.to_string(),
            topic: row.topic,
            hint: serde_json::from_str(&row.payload)?,
            attempt: u32::try_from(row.attempts + 1).unwrap_or(u32::MAX),
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        let id = message_id(delivery)?;
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        diesel::delete(hint_messages::table.find(id))
            .execute(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn requeue(&self, delivery: &Delivery, delay: Duration) -> Result<()> {
        let id = message_id(delivery)?;
        let visible_at = encode_time(self.clock.now() + to_chrono(delay)?);
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let updated = diesel::update(hint_messages::table.find(id))
            .set(hint_messages::visible_at.eq(visible_at))
            .execute(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;

        if updated == 0 {
            return Err(Error::Queue(format!(
                "message {} is no longer on topic '{}'",
                delivery.message_id, delivery.topic
            )));
        }
        Ok(())
    }
}
