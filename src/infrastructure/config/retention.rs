//! TTL windows for stored records.

use serde::Deserialize;

use crate::domain::Retention;

const fn default_pending_wait_ttl_secs() -> u64 {
    30 * 24 * 60 * 60
}

const fn default_terminal_wait_ttl_secs() -> u64 {
    60 * 60
}

const fn default_response_ttl_secs() -> u64 {
    24 * 60 * 60
}

const fn default_failure_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

/// `[retention]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    /// Lifetime of a join that has not completed yet.
    #[serde(default = "default_pending_wait_ttl_secs")]
    pub pending_wait_ttl_secs: u64,

    /// Lifetime of a join after it reaches SUCCESS or ERROR.
    #[serde(default = "default_terminal_wait_ttl_secs")]
    pub terminal_wait_ttl_secs: u64,

    #[serde(default = "default_response_ttl_secs")]
    pub response_ttl_secs: u64,

    /// Lifetime of callback failure records.
    #[serde(default = "default_failure_ttl_secs")]
    pub failure_ttl_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            pending_wait_ttl_secs: default_pending_wait_ttl_secs(),
            terminal_wait_ttl_secs: default_terminal_wait_ttl_secs(),
            response_ttl_secs: default_response_ttl_secs(),
            failure_ttl_secs: default_failure_ttl_secs(),
        }
    }
}

fn secs(value: u64) -> chrono::Duration {
    chrono::Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX))
}

impl RetentionConfig {
    #[must_use]
    pub fn to_retention(&self) -> Retention {
        Retention {
            pending_wait: secs(self.pending_wait_ttl_secs),
            terminal_wait: secs(self.terminal_wait_ttl_secs),
            response: secs(self.response_ttl_secs),
            failure: secs(self.failure_ttl_secs),
        }
    }
}
