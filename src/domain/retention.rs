//! TTL windows applied to persisted documents.

use chrono::{DateTime, Duration, Utc};

/// Retention windows used to compute `valid_until` timestamps.
///
/// Stores treat any document past its `valid_until` as gone; the
/// reconciler physically removes them on each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    /// How long a join is kept while it is still NEW.
    pub pending_wait: Duration,
    /// How long a join is kept after reaching SUCCESS or ERROR.
    pub terminal_wait: Duration,
    /// Fallback lifetime of a response. It only applies once no live join
    /// references the response.
    pub response: Duration,
    /// How long callback failure records are kept for diagnosis.
    pub failure: Duration,
}

impl Retention {
    #[must_use]
    pub fn pending_wait_until(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.pending_wait
    }

    #[must_use]
    pub fn terminal_wait_until(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.terminal_wait
    }

    #[must_use]
    pub fn response_until(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.response
    }

    #[must_use]
    pub fn failure_until(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.failure
    }
}

impl Default for Retention {
    fn default() -> Self {
        Self {
            pending_wait: Duration::days(30),
            terminal_wait: Duration::hours(1),
            response: Duration::hours(24),
            failure: Duration::days(7),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_joins_expire_before_pending_ones() {
        let retention = Retention::default();
        let now = Utc::now();
        assert!(retention.terminal_wait_until(now) < retention.pending_wait_until(now));
    }
}
