//! The engine wired end to end on in-memory adapters.

use std::sync::Arc;
use std::time::Duration;

use super::callback::RecordingCallback;
use super::clock::ManualClock;
use super::config;
use super::faulty::FaultyStore;
use crate::adapter::outbound::memory::{MemoryHintQueue, MemoryLock, MemoryStore};
use crate::application::{
    Backend, CallbackRegistry, DispatchOutcome, EventDispatcher, Reconciler, ReconcilerSettings,
    WaitNotifyEngine,
};
use crate::domain::Retention;

/// Callback kind under which [`MemoryHarness::callback`] is registered.
pub const RECORDING_KIND: &str = "rec";

/// A complete in-process deployment driven by a [`ManualClock`].
///
/// Every component shares one clock, store and queue, so tests can
/// register, notify, dispatch and reconcile without any I/O.
pub struct MemoryHarness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub queue: Arc<MemoryHintQueue>,
    pub lock: Arc<MemoryLock>,
    pub callback: RecordingCallback,
    pub callbacks: Arc<CallbackRegistry>,
    pub retention: Retention,
    pub backend: Backend,
    pub engine: WaitNotifyEngine,
    /// Dispatcher on the default publisher.
    pub dispatcher: EventDispatcher,
}

impl MemoryHarness {
    pub fn new() -> Self {
        Self::with_registry(CallbackRegistry::with_log_callback())
    }

    /// Build a harness on top of `registry`, adding the recording callback.
    pub fn with_registry(mut registry: CallbackRegistry) -> Self {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryHintQueue::with_clock(
            Duration::from_secs(60),
            clock.clone(),
        ));
        let lock = Arc::new(MemoryLock::with_clock(clock.clone()));

        let callback = RecordingCallback::new();
        registry.register(RECORDING_KIND, Arc::new(callback.clone()));
        let callbacks = Arc::new(registry);

        let retention = config::retention();
        let backend = Backend::new(store.clone(), queue.clone(), clock.clone());
        let engine = WaitNotifyEngine::new(backend.clone(), retention);
        let dispatcher = EventDispatcher::new(
            backend.clone(),
            callbacks.clone(),
            retention,
            config::dispatcher(),
        );

        Self {
            clock,
            store,
            queue,
            lock,
            callback,
            callbacks,
            retention,
            backend,
            engine,
            dispatcher,
        }
    }

    /// Another dispatcher on the default publisher, for spawning.
    pub fn new_dispatcher(&self) -> EventDispatcher {
        self.dispatcher_on(crate::domain::DEFAULT_PUBLISHER)
    }

    pub fn dispatcher_on(&self, topic: &str) -> EventDispatcher {
        EventDispatcher::new(
            self.backend.clone(),
            self.callbacks.clone(),
            self.retention,
            config::dispatcher_on(topic),
        )
    }

    /// Drain `topic` with a fresh dispatcher.
    pub async fn drain(&self, topic: &str) -> Vec<DispatchOutcome> {
        self.dispatcher_on(topic).drain().await
    }

    /// A [`FaultyStore`] over this harness's store, and a backend using it
    /// with the shared queue and clock.
    pub fn faulty_backend(&self) -> (Arc<FaultyStore>, Backend) {
        let store = Arc::new(FaultyStore::new(self.store.clone()));
        let backend = Backend::new(store.clone(), self.queue.clone(), self.clock.clone());
        (store, backend)
    }

    /// A dispatcher on the default publisher over `backend`.
    pub fn dispatcher_with(&self, backend: Backend) -> EventDispatcher {
        EventDispatcher::new(
            backend,
            self.callbacks.clone(),
            self.retention,
            config::dispatcher(),
        )
    }

    pub fn reconciler_settings(&self) -> ReconcilerSettings {
        config::reconciler()
    }

    pub fn reconciler(&self) -> Reconciler {
        self.reconciler_with(self.reconciler_settings())
    }

    pub fn reconciler_with(&self, settings: ReconcilerSettings) -> Reconciler {
        Reconciler::new(self.backend.clone(), self.lock.clone(), settings)
    }
}

impl Default for MemoryHarness {
    fn default() -> Self {
        Self::new()
    }
}
