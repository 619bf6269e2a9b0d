use std::sync::Arc;
use std::time::Duration;

use waitnotify::adapter::outbound::sqlite::{SqliteHintQueue, SqliteLock, SqliteStore};
use waitnotify::application::{
    Backend, CallbackRegistry, EventDispatcher, Reconciler, WaitNotifyEngine,
};
use waitnotify::domain::{Retention, DEFAULT_PUBLISHER};
use waitnotify::testkit::callback::RecordingCallback;
use waitnotify::testkit::clock::ManualClock;
use waitnotify::testkit::config;

use super::temp_db::TempDb;

pub const RECORDING_KIND: &str = "rec";

/// The engine wired to SQLite adapters over a temporary database.
pub struct SqliteHarness {
    pub db: TempDb,
    pub clock: Arc<ManualClock>,
    pub store: Arc<SqliteStore>,
    pub queue: Arc<SqliteHintQueue>,
    pub lock: Arc<SqliteLock>,
    pub callback: RecordingCallback,
    pub callbacks: Arc<CallbackRegistry>,
    pub retention: Retention,
    pub backend: Backend,
    pub engine: WaitNotifyEngine,
}

impl SqliteHarness {
    pub fn new(name: &str) -> Self {
        let db = TempDb::create(name);
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(SqliteStore::new(db.pool().clone()));
        let queue = Arc::new(
            SqliteHintQueue::with_clock(db.pool().clone(), Duration::from_secs(60), clock.clone())
                .expect("build queue"),
        );
        let lock = Arc::new(SqliteLock::with_clock(db.pool().clone(), clock.clone()));

        let callback = RecordingCallback::new();
        let mut registry = CallbackRegistry::with_log_callback();
        registry.register(RECORDING_KIND, Arc::new(callback.clone()));

        let retention = config::retention();
        let backend = Backend::new(store.clone(), queue.clone(), clock.clone());
        let engine = WaitNotifyEngine::new(backend.clone(), retention);

        Self {
            db,
            clock,
            store,
            queue,
            lock,
            callback,
            callbacks: Arc::new(registry),
            retention,
            backend,
            engine,
        }
    }

    pub fn dispatcher(&self) -> EventDispatcher {
        self.dispatcher_on(DEFAULT_PUBLISHER)
    }

    pub fn dispatcher_on(&self, topic: &str) -> EventDispatcher {
        EventDispatcher::new(
            self.backend.clone(),
            self.callbacks.clone(),
            self.retention,
            config::dispatcher_on(topic),
        )
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.backend.clone(), self.lock.clone(), config::reconciler())
    }
}
