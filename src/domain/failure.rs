//! Diagnostic records for failed callbacks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::WaitInstanceId;
use super::response::ResponseMap;

/// Written when a join's callback fails. Kept for operators; the engine
/// never reads it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitInstanceError {
    pub id: String,
    pub wait_instance_id: WaitInstanceId,
    /// Responses the callback was invoked with.
    pub responses: ResponseMap,
    pub detail: String,
    pub created_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl WaitInstanceError {
    #[must_use]
    pub fn new(
        wait_instance_id: WaitInstanceId,
        responses: ResponseMap,
        detail: impl Into<String>,
        created_at: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            wait_instance_id,
            responses,
            detail: detail.into(),
            created_at,
            valid_until,
        }
    }
}
