//! Database model types for Diesel ORM.
//!
//! Timestamps are stored as text via [`encode_time`] so that string
//! comparison in SQL follows time order.

use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;

use super::schema::{
    hint_messages, locks, responses, wait_correlations, wait_instance_errors, wait_instances,
};
use crate::error::{Error, Result};

/// Fixed-width RFC3339 encoding used for every timestamp column.
pub fn encode_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_time(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Parse(format!("invalid timestamp '{s}': {e}")))
}

/// Database row for a join.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = wait_instances)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct WaitInstanceRow {
    pub id: String,
    pub publisher: String,
    pub callback_kind: String,
    pub callback_context: String,
    /// JSON array, sorted.
    pub correlation_ids: String,
    pub status: String,
    pub claim_lease_until: String,
    pub created_at: String,
    pub valid_until: String,
}

/// Correlation index entry.
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = wait_correlations)]
pub struct WaitCorrelationRow {
    pub wait_instance_id: String,
    pub correlation_id: String,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = responses)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ResponseRow {
    pub correlation_id: String,
    pub payload: String,
    pub is_error: bool,
    pub created_at: String,
    pub valid_until: String,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = wait_instance_errors)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct WaitInstanceErrorRow {
    pub id: String,
    pub wait_instance_id: String,
    /// JSON array of responses.
    pub responses: String,
    pub detail: String,
    pub created_at: String,
    pub valid_until: String,
}

/// Queue message (insertable).
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = hint_messages)]
pub struct NewHintMessageRow {
    pub topic: String,
    pub payload: String,
    pub attempts: i32,
    pub visible_at: String,
    pub created_at: String,
}

/// Queue message (queryable).
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = hint_messages)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct HintMessageRow {
    pub id: i32,
    pub topic: String,
    pub payload: String,
    pub attempts: i32,
    pub visible_at: String,
    pub created_at: String,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = locks)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LockRow {
    pub key: String,
    pub owner: String,
    pub token: String,
    pub expires_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn encoded_times_sort_chronologically() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let late = early + chrono::Duration::milliseconds(1500);
        assert!(encode_time(early) < encode_time(late));
        assert_eq!(encode_time(early).len(), encode_time(late).len());
    }

    #[test]
    fn decode_inverts_encode() {
        let t = Utc.with_ymd_and_hms(2024, 6, 30, 23, 59, 59).unwrap()
            + chrono::Duration::microseconds(42);
        assert_eq!(decode_time(&encode_time(t)).unwrap(), t);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(decode_time("yesterday"), Err(Error::Parse(_))));
    }
}
