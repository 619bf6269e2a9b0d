//! Composition root for runtime wiring.

use std::sync::Arc;

use tracing::info;

use crate::adapter::outbound::sqlite::database::connection::open;
use crate::adapter::outbound::sqlite::{SqliteHintQueue, SqliteLock, SqliteStore};
use crate::application::{
    Backend, CallbackRegistry, DispatcherHandle, EventDispatcher, Reconciler, ReconcilerHandle,
    WaitNotifyEngine,
};
use crate::domain::Retention;
use crate::error::Result;
use crate::infrastructure::config::Config;
use crate::port::{Clock, SystemClock};

/// Every component of a deployment, built over one SQLite database.
pub struct Components {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub queue: Arc<SqliteHintQueue>,
    pub lock: Arc<SqliteLock>,
    pub callbacks: Arc<CallbackRegistry>,
    pub backend: Backend,
    pub retention: Retention,
}

/// Open the configured database, run migrations and wire the adapters.
///
/// # Errors
/// Returns an error if the database cannot be opened or migrated.
pub fn build(config: Config, callbacks: CallbackRegistry) -> Result<Components> {
    build_with_clock(config, callbacks, Arc::new(SystemClock))
}

/// As [`build`], with every adapter reading time from `clock`.
///
/// # Errors
/// Returns an error if the database cannot be opened or migrated.
pub fn build_with_clock(
    config: Config,
    callbacks: CallbackRegistry,
    clock: Arc<dyn Clock>,
) -> Result<Components> {
    let pool = open(&config.database)?;
    info!(database = %config.database, "Database ready");

    let store = Arc::new(SqliteStore::new(pool.clone()));
    let queue = Arc::new(SqliteHintQueue::with_clock(
        pool.clone(),
        config.dispatcher.visibility_timeout(),
        clock.clone(),
    )?);
    let lock = Arc::new(SqliteLock::with_clock(pool, clock.clone()));
    let backend = Backend::new(store.clone(), queue.clone(), clock);
    let retention = config.retention.to_retention();

    Ok(Components {
        config,
        store,
        queue,
        lock,
        callbacks: Arc::new(callbacks),
        backend,
        retention,
    })
}

/// Identity used as the reconciler lock owner.
#[must_use]
pub fn instance_owner() -> String {
    format!("waitnotify-{}-{}", std::process::id(), uuid::Uuid::new_v4())
}

impl Components {
    #[must_use]
    pub fn engine(&self) -> WaitNotifyEngine {
        WaitNotifyEngine::new(self.backend.clone(), self.retention)
    }

    /// One dispatcher per configured topic.
    #[must_use]
    pub fn dispatchers(&self) -> Vec<EventDispatcher> {
        self.config
            .dispatcher
            .topics
            .iter()
            .map(|topic| {
                EventDispatcher::new(
                    self.backend.clone(),
                    self.callbacks.clone(),
                    self.retention,
                    self.config.dispatcher.settings_for(topic),
                )
            })
            .collect()
    }

    #[must_use]
    pub fn reconciler(&self, owner: impl Into<String>) -> Reconciler {
        Reconciler::new(
            self.backend.clone(),
            self.lock.clone(),
            self.config.reconciler.settings(owner),
        )
    }

    /// Spawn the dispatchers, and the reconciler when enabled.
    #[must_use]
    pub fn start(&self) -> RuntimeHandle {
        let dispatchers = self
            .dispatchers()
            .into_iter()
            .map(EventDispatcher::start)
            .collect();
        let reconciler = self
            .config
            .reconciler
            .enabled
            .then(|| self.reconciler(instance_owner()).start());

        RuntimeHandle {
            dispatchers,
            reconciler,
        }
    }
}

/// Running background workers.
pub struct RuntimeHandle {
    dispatchers: Vec<DispatcherHandle>,
    reconciler: Option<ReconcilerHandle>,
}

impl RuntimeHandle {
    #[must_use]
    pub fn dispatcher_count(&self) -> usize {
        self.dispatchers.len()
    }

    #[must_use]
    pub fn reconciler_running(&self) -> bool {
        self.reconciler.is_some()
    }

    /// Stop every worker, waiting for in-flight iterations to finish.
    pub async fn shutdown(self) {
        for dispatcher in self.dispatchers {
            dispatcher.shutdown().await;
        }
        if let Some(reconciler) = self.reconciler {
            reconciler.shutdown().await;
        }
        info!("Workers stopped");
    }
}
