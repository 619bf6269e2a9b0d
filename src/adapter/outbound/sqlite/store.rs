//! SQLite store for joins, their correlation index, responses and failure
//! records.
//!
//! Expiry is enforced by filtering `valid_until` on every read; rows are
//! physically removed by `purge_expired`. A response stays live past its
//! own `valid_until` while `wait_correlations` ties it to a live join.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;

use crate::adapter::outbound::sqlite::database::connection::DbPool;
use crate::adapter::outbound::sqlite::database::model::{
    decode_time, encode_time, ResponseRow, WaitCorrelationRow, WaitInstanceErrorRow,
    WaitInstanceRow,
};
use crate::adapter::outbound::sqlite::database::schema::{
    responses, wait_correlations, wait_instance_errors, wait_instances,
};
use crate::domain::{
    CallbackSpec, CorrelationId, InsertOutcome, Response, ResponseCursor, ResponseMap,
    WaitInstance, WaitInstanceError, WaitInstanceId, WaitStatus,
};
use crate::error::{Error, Result};
use crate::port::{PurgedWaits, ResponseStore, WaitStore};

type Conn = diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<SqliteConnection>>;

/// Row counts reported by [`SqliteStore::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub waits_new: i64,
    pub waits_success: i64,
    pub waits_error: i64,
    pub responses: i64,
    pub failures: i64,
}

impl StoreStats {
    #[must_use]
    pub fn waits_total(&self) -> i64 {
        self.waits_new + self.waits_success + self.waits_error
    }
}

/// SQLite-backed implementation of [`WaitStore`] and [`ResponseStore`].
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<Conn> {
        self.pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))
    }

    /// Count rows by kind, including rows past their TTL that have not been
    /// purged yet.
    ///
    /// # Errors
    /// Returns an error if a query fails.
    pub fn stats(&self) -> Result<StoreStats> {
        let mut conn = self.conn()?;

        let by_status: Vec<(String, i64)> = wait_instances::table
            .group_by(wait_instances::status)
            .select((wait_instances::status, diesel::dsl::count_star()))
            .load(&mut conn)
            .map_err(db_err)?;

        let mut stats = StoreStats {
            responses: responses::table
                .count()
                .get_result(&mut conn)
                .map_err(db_err)?,
            failures: wait_instance_errors::table
                .count()
                .get_result(&mut conn)
                .map_err(db_err)?,
            ..StoreStats::default()
        };
        for (status, count) in by_status {
            match status.parse::<WaitStatus>()? {
                WaitStatus::New => stats.waits_new = count,
                WaitStatus::Success => stats.waits_success = count,
                WaitStatus::Error => stats.waits_error = count,
            }
        }
        Ok(stats)
    }

    fn wait_to_row(wait: &WaitInstance) -> Result<WaitInstanceRow> {
        Ok(WaitInstanceRow {
            id: wait.id.to_string(),
            publisher: wait.publisher.clone(),
            callback_kind: wait.callback.kind.clone(),
            callback_context: serde_json::to_string(&wait.callback.context)?,
            correlation_ids: serde_json::to_string(&wait.correlation_ids)?,
            status: wait.status.as_str().to_string(),
            claim_lease_until: encode_time(wait.claim_lease_until),
            created_at: encode_time(wait.created_at),
            valid_until: encode_time(wait.valid_until),
        })
    }

    fn wait_from_row(row: WaitInstanceRow) -> Result<WaitInstance> {
        Ok(WaitInstance {
            id: WaitInstanceId::from(row.id),
            correlation_ids: serde_json::from_str(&row.correlation_ids)?,
            callback: CallbackSpec {
                kind: row.callback_kind,
                context: serde_json::from_str(&row.callback_context)?,
            },
            publisher: row.publisher,
            status: row.status.parse()?,
            claim_lease_until: decode_time(&row.claim_lease_until)?,
            created_at: decode_time(&row.created_at)?,
            valid_until: decode_time(&row.valid_until)?,
        })
    }

    fn response_to_row(response: &Response) -> Result<ResponseRow> {
        Ok(ResponseRow {
            correlation_id: response.correlation_id.to_string(),
            payload: serde_json::to_string(&response.payload)?,
            is_error: response.is_error,
            created_at: encode_time(response.created_at),
            valid_until: encode_time(response.valid_until),
        })
    }

    fn response_from_row(row: ResponseRow) -> Result<Response> {
        Ok(Response {
            correlation_id: CorrelationId::from_stored(row.correlation_id),
            payload: serde_json::from_str(&row.payload)?,
            is_error: row.is_error,
            created_at: decode_time(&row.created_at)?,
            valid_until: decode_time(&row.valid_until)?,
        })
    }

    fn failure_to_row(failure: &WaitInstanceError) -> Result<WaitInstanceErrorRow> {
        let responses: Vec<&Response> = failure.responses.values().collect();
        Ok(WaitInstanceErrorRow {
            id: failure.id.clone(),
            wait_instance_id: failure.wait_instance_id.to_string(),
            responses: serde_json::to_string(&responses)?,
            detail: failure.detail.clone(),
            created_at: encode_time(failure.created_at),
            valid_until: encode_time(failure.valid_until),
        })
    }

    fn failure_from_row(row: WaitInstanceErrorRow) -> Result<WaitInstanceError> {
        let responses: Vec<Response> = serde_json::from_str(&row.responses)?;
        Ok(WaitInstanceError {
            id: row.id,
            wait_instance_id: WaitInstanceId::from(row.wait_instance_id),
            responses: responses
                .into_iter()
                .map(|r| (r.correlation_id.clone(), r))
                .collect::<ResponseMap>(),
            detail: row.detail,
            created_at: decode_time(&row.created_at)?,
            valid_until: decode_time(&row.valid_until)?,
        })
    }
}

fn db_err(e: diesel::result::Error) -> Error {
    Error::Database(e.to_string())
}

fn id_strings(ids: &[CorrelationId]) -> Vec<&str> {
    ids.iter().map(CorrelationId::as_str).collect()
}

#[async_trait]
impl WaitStore for SqliteStore {
    async fn insert_wait(&self, wait: &WaitInstance) -> Result<()> {
        let row = Self::wait_to_row(wait)?;
        let index: Vec<WaitCorrelationRow> = wait
            .correlation_ids
            .iter()
            .map(|c| WaitCorrelationRow {
                wait_instance_id: row.id.clone(),
                correlation_id: c.to_string(),
            })
            .collect();

        let mut conn = self.conn()?;
        conn.immediate_transaction(|conn| {
            diesel::insert_into(wait_instances::table)
                .values(&row)
                .execute(conn)?;
            diesel::insert_into(wait_correlations::table)
                .values(&index)
                .execute(conn)?;
            Ok::<_, diesel::result::Error>(())
        })
        .map_err(db_err)
    }

    async fn get_wait(
        &self,
        id: &WaitInstanceId,
        now: DateTime<Utc>,
    ) -> Result<Option<WaitInstance>> {
        let mut conn = self.conn()?;
        let row: Option<WaitInstanceRow> = wait_instances::table
            .find(id.as_str())
            .filter(wait_instances::valid_until.gt(encode_time(now)))
            .select(WaitInstanceRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(db_err)?;

        row.map(Self::wait_from_row).transpose()
    }

    async fn find_waits_for(
        &self,
        correlation_ids: &[CorrelationId],
        now: DateTime<Utc>,
    ) -> Result<Vec<WaitInstance>> {
        if correlation_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn()?;
        let matching = wait_correlations::table
            .filter(wait_correlations::correlation_id.eq_any(id_strings(correlation_ids)))
            .select(wait_correlations::wait_instance_id);

        let rows: Vec<WaitInstanceRow> = wait_instances::table
            .filter(wait_instances::id.eq_any(matching))
            .filter(wait_instances::valid_until.gt(encode_time(now)))
            .order(wait_instances::id.asc())
            .select(WaitInstanceRow::as_select())
            .load(&mut conn)
            .map_err(db_err)?;

        rows.into_iter().map(Self::wait_from_row).collect()
    }

    async fn try_claim(
        &self,
        id: &WaitInstanceId,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<bool> {
        let now = encode_time(now);
        let mut conn = self.conn()?;
        let updated = diesel::update(
            wait_instances::table
                .find(id.as_str())
                .filter(wait_instances::status.eq(WaitStatus::New.as_str()))
                .filter(wait_instances::claim_lease_until.le(now.as_str()))
                .filter(wait_instances::valid_until.gt(now.as_str())),
        )
        .set(wait_instances::claim_lease_until.eq(encode_time(lease_until)))
        .execute(&mut conn)
        .map_err(db_err)?;

        Ok(updated == 1)
    }

    async fn release_claim(&self, id: &WaitInstanceId, now: DateTime<Utc>) -> Result<bool> {
        let mut conn = self.conn()?;
        let updated = diesel::update(
            wait_instances::table
                .find(id.as_str())
                .filter(wait_instances::status.eq(WaitStatus::New.as_str())),
        )
        .set(wait_instances::claim_lease_until.eq(encode_time(now)))
        .execute(&mut conn)
        .map_err(db_err)?;

        Ok(updated == 1)
    }

    async fn complete(
        &self,
        id: &WaitInstanceId,
        status: WaitStatus,
        valid_until: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = self.conn()?;
        let updated = diesel::update(
            wait_instances::table
                .find(id.as_str())
                .filter(wait_instances::status.eq(WaitStatus::New.as_str())),
        )
        .set((
            wait_instances::status.eq(status.as_str()),
            wait_instances::valid_until.eq(encode_time(valid_until)),
        ))
        .execute(&mut conn)
        .map_err(db_err)?;

        Ok(updated == 1)
    }

    async fn record_failure(&self, failure: &WaitInstanceError) -> Result<()> {
        let row = Self::failure_to_row(failure)?;
        let mut conn = self.conn()?;
        diesel::insert_into(wait_instance_errors::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(db_err)?;
        Ok(())
    }

    async fn failures_for(&self, id: &WaitInstanceId) -> Result<Vec<WaitInstanceError>> {
        let mut conn = self.conn()?;
        let rows: Vec<WaitInstanceErrorRow> = wait_instance_errors::table
            .filter(wait_instance_errors::wait_instance_id.eq(id.as_str()))
            .order(wait_instance_errors::created_at.asc())
            .select(WaitInstanceErrorRow::as_select())
            .load(&mut conn)
            .map_err(db_err)?;

        rows.into_iter().map(Self::failure_from_row).collect()
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<PurgedWaits> {
        let now = encode_time(now);
        let mut conn = self.conn()?;
        conn.immediate_transaction(|conn| {
            let expired = wait_instances::table
                .filter(wait_instances::valid_until.le(now.as_str()))
                .select(wait_instances::id);
            diesel::delete(
                wait_correlations::table
                    .filter(wait_correlations::wait_instance_id.eq_any(expired)),
            )
            .execute(conn)?;
            let waits =
                diesel::delete(wait_instances::table.filter(wait_instances::valid_until.le(now.as_str())))
                    .execute(conn)?;
            let failures = diesel::delete(
                wait_instance_errors::table.filter(wait_instance_errors::valid_until.le(now.as_str())),
            )
            .execute(conn)?;
            Ok::<_, diesel::result::Error>(PurgedWaits { waits, failures })
        })
        .map_err(db_err)
    }
}

#[async_trait]
impl ResponseStore for SqliteStore {
    async fn insert_response(&self, response: &Response) -> Result<InsertOutcome> {
        let row = Self::response_to_row(response)?;
        let mut conn = self.conn()?;
        match diesel::insert_into(responses::table)
            .values(&row)
            .execute(&mut conn)
        {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Ok(InsertOutcome::Duplicate)
            }
            Err(e) => Err(db_err(e)),
        }
    }

    async fn get_responses(
        &self,
        correlation_ids: &[CorrelationId],
        now: DateTime<Utc>,
    ) -> Result<Vec<Response>> {
        if correlation_ids.is_empty() {
            return Ok(Vec::new());
        }
        let now = encode_time(now);
        let live_waits = wait_instances::table
            .filter(wait_instances::valid_until.gt(now.clone()))
            .select(wait_instances::id);
        let pinned = wait_correlations::table
            .filter(wait_correlations::wait_instance_id.eq_any(live_waits))
            .select(wait_correlations::correlation_id);

        let mut conn = self.conn()?;
        let rows: Vec<ResponseRow> = responses::table
            .filter(responses::correlation_id.eq_any(id_strings(correlation_ids)))
            .filter(
                responses::valid_until
                    .gt(now)
                    .or(responses::correlation_id.eq_any(pinned)),
            )
            .select(ResponseRow::as_select())
            .load(&mut conn)
            .map_err(db_err)?;

        rows.into_iter().map(Self::response_from_row).collect()
    }

    async fn scan_responses(
        &self,
        after: Option<&ResponseCursor>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Response>> {
        let now = encode_time(now);
        let live_waits = wait_instances::table
            .filter(wait_instances::valid_until.gt(now.clone()))
            .select(wait_instances::id);
        let pinned = wait_correlations::table
            .filter(wait_correlations::wait_instance_id.eq_any(live_waits))
            .select(wait_correlations::correlation_id);

        let mut conn = self.conn()?;
        let mut query = responses::table
            .filter(
                responses::valid_until
                    .gt(now)
                    .or(responses::correlation_id.eq_any(pinned)),
            )
            .order((responses::created_at.asc(), responses::correlation_id.asc()))
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .select(ResponseRow::as_select())
            .into_boxed();

        if let Some(cursor) = after {
            let created_at = encode_time(cursor.created_at);
            query = query.filter(
                responses::created_at.gt(created_at.clone()).or(responses::created_at
                    .eq(created_at)
                    .and(responses::correlation_id.gt(cursor.correlation_id.to_string()))),
            );
        }

        let rows: Vec<ResponseRow> = query.load(&mut conn).map_err(db_err)?;
        rows.into_iter().map(Self::response_from_row).collect()
    }

    async fn delete_responses(&self, correlation_ids: &[CorrelationId]) -> Result<usize> {
        if correlation_ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn()?;
        diesel::delete(
            responses::table.filter(responses::correlation_id.eq_any(id_strings(correlation_ids))),
        )
        .execute(&mut conn)
        .map_err(db_err)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let now = encode_time(now);
        let live_waits = wait_instances::table
            .filter(wait_instances::valid_until.gt(now.clone()))
            .select(wait_instances::id);
        let pinned = wait_correlations::table
            .filter(wait_correlations::wait_instance_id.eq_any(live_waits))
            .select(wait_correlations::correlation_id);

        let mut conn = self.conn()?;
        diesel::delete(
            responses::table
                .filter(responses::valid_until.le(now))
                .filter(responses::correlation_id.ne_all(pinned)),
        )
        .execute(&mut conn)
        .map_err(db_err)
    }
}
