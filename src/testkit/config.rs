//! Canonical test settings.
//!
//! Single source of truth for the settings used across tests, so each test
//! module does not define its own slightly different defaults.

use std::time::Duration;

use crate::application::{DispatcherSettings, ReconcilerSettings};
use crate::domain::{Retention, DEFAULT_PUBLISHER};

/// Production retention windows.
pub fn retention() -> Retention {
    Retention::default()
}

/// Dispatcher on the default publisher with no waiting between polls.
pub fn dispatcher() -> DispatcherSettings {
    dispatcher_on(DEFAULT_PUBLISHER)
}

pub fn dispatcher_on(topic: &str) -> DispatcherSettings {
    DispatcherSettings {
        topic: topic.to_string(),
        lease: chrono::Duration::seconds(60),
        poll_interval: Duration::from_millis(5),
        max_attempts: 3,
        retry_delay: Duration::ZERO,
    }
}

/// Reconciler with a fixed owner and a 30 second orphan grace period.
pub fn reconciler() -> ReconcilerSettings {
    ReconcilerSettings {
        interval: Duration::from_millis(20),
        batch_size: 100,
        max_batches: 10,
        orphan_grace: chrono::Duration::seconds(30),
        delete_batch_size: 50,
        lock_key: "waitnotify-reconciler".to_string(),
        lock_lease: Duration::from_secs(60),
        owner: "test-reconciler".to_string(),
    }
}
