//! SQLite-backed lease lock.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use diesel::prelude::*;

use crate::adapter::outbound::sqlite::database::connection::DbPool;
use crate::adapter::outbound::sqlite::database::model::{decode_time, encode_time, LockRow};
use crate::adapter::outbound::sqlite::database::schema::locks;
use crate::error::{Error, Result};
use crate::port::{Clock, DistributedLock, LockLease, SystemClock};

/// Lock shared by every process using the same database file.
pub struct SqliteLock {
    pool: DbPool,
    clock: Arc<dyn Clock>,
}

impl SqliteLock {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(pool: DbPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl DistributedLock for SqliteLock {
    async fn try_acquire(
        &self,
        key: &str,
        owner: &str,
        lease: Duration,
    ) -> Result<Option<LockLease>> {
        let lease = chrono::Duration::from_std(lease).map_err(|e| Error::Lock(e.to_string()))?;
        let now = self.clock.now();
        let row = LockRow {
            key: key.to_string(),
            owner: owner.to_string(),
            token: uuid::Uuid::new_v4().to_string(),
            expires_at: encode_time(now + lease),
        };

        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let acquired = conn
            .immediate_transaction(|conn| {
                let current: Option<LockRow> = locks::table
                    .find(key)
                    .select(LockRow::as_select())
                    .first(conn)
                    .optional()?;

                if let Some(current) = current {
                    if current.expires_at > encode_time(now) && current.owner != owner {
                        return Ok(false);
                    }
                }
                diesel::replace_into(locks::table)
                    .values(&row)
                    .execute(conn)?;
                Ok::<_, diesel::result::Error>(true)
            })
            .map_err(|e| Error::Database(e.to_string()))?;

        if !acquired {
            return Ok(None);
        }
        Ok(Some(LockLease {
            key: row.key,
            owner: row.owner,
            token: row.token,
            expires_at: decode_time(&row.expires_at)?,
        }))
    }

    async fn release(&self, lease: &LockLease) -> Result<bool> {
        let now = encode_time(self.clock.now());
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let held: Option<LockRow> = locks::table
            .find(lease.key.as_str())
            .filter(locks::token.eq(lease.token.as_str()))
            .select(LockRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;

        let Some(held) = held else {
            return Ok(false);
        };
        diesel::delete(
            locks::table
                .find(lease.key.as_str())
                .filter(locks::token.eq(lease.token.as_str())),
        )
        .execute(&mut conn)
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(held.expires_at > now)
    }
}
