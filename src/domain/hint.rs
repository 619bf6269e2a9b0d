//! Dispatch hints carried on the queue.

use serde::{Deserialize, Serialize};

use super::id::WaitInstanceId;

/// Suggestion that a join may be ready for evaluation.
///
/// Hints are never authoritative: the dispatcher re-reads the join and its
/// responses from the store before acting on one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchHint {
    pub wait_instance_id: WaitInstanceId,
}

impl DispatchHint {
    #[must_use]
    pub fn new(wait_instance_id: WaitInstanceId) -> Self {
        Self { wait_instance_id }
    }
}
