//! Dispatcher and hint queue configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::application::DispatcherSettings;
use crate::domain::DEFAULT_PUBLISHER;

fn default_topics() -> Vec<String> {
    vec![DEFAULT_PUBLISHER.to_string()]
}

const fn default_lease_secs() -> u64 {
    60
}

const fn default_poll_interval_ms() -> u64 {
    500
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_retry_delay_secs() -> u64 {
    5
}

const fn default_visibility_timeout_secs() -> u64 {
    60
}

/// `[dispatcher]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatcherConfig {
    /// Publisher topics to consume, one dispatcher each.
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,

    /// Claim lease. Callbacks must finish well inside it.
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Deliveries of one hint before it is dropped.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// How long a received hint stays hidden from other consumers.
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            topics: default_topics(),
            lease_secs: default_lease_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            visibility_timeout_secs: default_visibility_timeout_secs(),
        }
    }
}

impl DispatcherConfig {
    #[must_use]
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    /// Settings for the dispatcher consuming `topic`.
    #[must_use]
    pub fn settings_for(&self, topic: &str) -> DispatcherSettings {
        DispatcherSettings {
            topic: topic.to_string(),
            lease: chrono::Duration::seconds(i64::try_from(self.lease_secs).unwrap_or(i64::MAX)),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.max_attempts,
            retry_delay: Duration::from_secs(self.retry_delay_secs),
        }
    }
}
