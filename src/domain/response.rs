//! Results reported for correlation IDs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::CorrelationId;

/// The single result ever stored for a correlation ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub correlation_id: CorrelationId,
    pub payload: serde_json::Value,
    pub is_error: bool,
    pub created_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl Response {
    #[must_use]
    pub fn new(
        correlation_id: CorrelationId,
        payload: serde_json::Value,
        is_error: bool,
        created_at: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Self {
        Self {
            correlation_id,
            payload,
            is_error,
            created_at,
            valid_until,
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.valid_until <= now
    }
}

/// Responses keyed by correlation ID, as handed to callbacks.
pub type ResponseMap = BTreeMap<CorrelationId, Response>;

/// True if any response in the map reports a failure.
#[must_use]
pub fn any_error(responses: &ResponseMap) -> bool {
    responses.values().any(|r| r.is_error)
}

/// Keyset position used to page through responses oldest first.
///
/// Orders the same way the scan does.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResponseCursor {
    pub created_at: DateTime<Utc>,
    pub correlation_id: CorrelationId,
}

impl From<&Response> for ResponseCursor {
    fn from(response: &Response) -> Self {
        Self {
            created_at: response.created_at,
            correlation_id: response.correlation_id.clone(),
        }
    }
}

/// Outcome of a unique insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A response already exists for the correlation ID; nothing was written.
    Duplicate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(id: &str, is_error: bool) -> Response {
        let now = Utc::now();
        Response::new(
            CorrelationId::try_new(id).unwrap(),
            json!({"id": id}),
            is_error,
            now,
            now + chrono::Duration::hours(1),
        )
    }

    #[test]
    fn any_error_detects_a_single_failure() {
        let mut map = ResponseMap::new();
        map.insert(CorrelationId::try_new("a").unwrap(), response("a", false));
        assert!(!any_error(&map));
        map.insert(CorrelationId::try_new("b").unwrap(), response("b", true));
        assert!(any_error(&map));
    }

    #[test]
    fn expiry_is_inclusive_of_valid_until() {
        let r = response("a", false);
        assert!(!r.is_expired(r.created_at));
        assert!(r.is_expired(r.valid_until));
    }
}
