//! Registered joins and their lifecycle.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::callback::CallbackSpec;
use super::error::DomainError;
use super::id::{CorrelationId, WaitInstanceId};

/// Publisher used when a join does not name one.
pub const DEFAULT_PUBLISHER: &str = "general";

/// Lifecycle status of a join. NEW is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WaitStatus {
    New,
    Success,
    Error,
}

impl WaitStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Success => "SUCCESS",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for WaitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WaitStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "SUCCESS" => Ok(Self::Success),
            "ERROR" => Ok(Self::Error),
            other => Err(DomainError::InvalidStatus {
                value: other.to_string(),
            }),
        }
    }
}

/// A registered intent to run a callback once every correlation ID has a
/// response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitInstance {
    pub id: WaitInstanceId,
    /// Correlation IDs this join waits on. Never empty.
    pub correlation_ids: BTreeSet<CorrelationId>,
    pub callback: CallbackSpec,
    /// Queue topic that receives dispatch hints for this join.
    pub publisher: String,
    pub status: WaitStatus,
    /// No worker may claim the join while this is in the future.
    pub claim_lease_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl WaitInstance {
    /// Build a new NEW join, collapsing duplicate correlation IDs.
    ///
    /// The claim lease starts at `now` so the join is immediately claimable.
    ///
    /// # Errors
    /// Returns [`DomainError::EmptyCorrelationIds`] if no IDs are given and
    /// [`DomainError::BlankPublisher`] if `publisher` is blank.
    pub fn try_new<I>(
        publisher: impl Into<String>,
        callback: CallbackSpec,
        correlation_ids: I,
        now: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = CorrelationId>,
    {
        let correlation_ids: BTreeSet<CorrelationId> = correlation_ids.into_iter().collect();
        if correlation_ids.is_empty() {
            return Err(DomainError::EmptyCorrelationIds);
        }
        let publisher = publisher.into();
        if publisher.trim().is_empty() {
            return Err(DomainError::BlankPublisher);
        }

        Ok(Self {
            id: WaitInstanceId::new(),
            correlation_ids,
            callback,
            publisher,
            status: WaitStatus::New,
            claim_lease_until: now,
            created_at: now,
            valid_until,
        })
    }

    /// True when a worker may claim this join at `now`.
    #[must_use]
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        self.status == WaitStatus::New && self.claim_lease_until <= now
    }

    /// True when the join has passed its TTL.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.valid_until <= now
    }

    /// Correlation IDs not present in `available`.
    pub fn missing<'a, F>(&'a self, mut available: F) -> impl Iterator<Item = &'a CorrelationId>
    where
        F: FnMut(&CorrelationId) -> bool + 'a,
    {
        self.correlation_ids.iter().filter(move |id| !available(*id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn cid(s: &str) -> CorrelationId {
        CorrelationId::try_new(s).unwrap()
    }

    #[test]
    fn try_new_collapses_duplicates() {
        let now = Utc::now();
        let wait = WaitInstance::try_new(
            DEFAULT_PUBLISHER,
            CallbackSpec::new("log"),
            vec![cid("x"), cid("y"), cid("x")],
            now,
            now + Duration::days(1),
        )
        .unwrap();
        assert_eq!(wait.correlation_ids.len(), 2);
        assert_eq!(wait.status, WaitStatus::New);
        assert!(wait.is_claimable(now));
    }

    #[test]
    fn try_new_rejects_empty_set() {
        let now = Utc::now();
        let result = WaitInstance::try_new(
            DEFAULT_PUBLISHER,
            CallbackSpec::new("log"),
            Vec::new(),
            now,
            now,
        );
        assert_eq!(result.unwrap_err(), DomainError::EmptyCorrelationIds);
    }

    #[test]
    fn try_new_rejects_blank_publisher() {
        let now = Utc::now();
        let result =
            WaitInstance::try_new(" ", CallbackSpec::new("log"), vec![cid("x")], now, now);
        assert_eq!(result.unwrap_err(), DomainError::BlankPublisher);
    }

    #[test]
    fn leased_or_terminal_joins_are_not_claimable() {
        let now = Utc::now();
        let mut wait = WaitInstance::try_new(
            DEFAULT_PUBLISHER,
            CallbackSpec::new("log"),
            vec![cid("x")],
            now,
            now + Duration::days(1),
        )
        .unwrap();

        wait.claim_lease_until = now + Duration::seconds(60);
        assert!(!wait.is_claimable(now));
        assert!(wait.is_claimable(now + Duration::seconds(60)));

        wait.claim_lease_until = now;
        wait.status = WaitStatus::Success;
        assert!(!wait.is_claimable(now));
    }

    #[test]
    fn missing_lists_ids_without_responses() {
        let now = Utc::now();
        let wait = WaitInstance::try_new(
            DEFAULT_PUBLISHER,
            CallbackSpec::new("log"),
            vec![cid("x"), cid("y")],
            now,
            now,
        )
        .unwrap();
        let missing: Vec<_> = wait.missing(|id| id.as_str() == "x").collect();
        assert_eq!(missing, vec![&cid("y")]);
    }

    #[test]
    fn status_parses_its_own_display() {
        for status in [WaitStatus::New, WaitStatus::Success, WaitStatus::Error] {
            assert_eq!(status.to_string().parse::<WaitStatus>().unwrap(), status);
        }
        assert!("DONE".parse::<WaitStatus>().is_err());
    }
}
