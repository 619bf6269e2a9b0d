//! Shared handles to the outbound ports.

use std::sync::Arc;

use crate::port::{Clock, HintQueue, ResponseStore, WaitStore};

/// The set of outbound ports the engine, dispatcher and reconciler share.
///
/// Cloning is cheap; every field is an `Arc`.
#[derive(Clone)]
pub struct Backend {
    pub waits: Arc<dyn WaitStore>,
    pub responses: Arc<dyn ResponseStore>,
    pub queue: Arc<dyn HintQueue>,
    pub clock: Arc<dyn Clock>,
}

impl Backend {
    /// Build a backend from one store that holds both joins and responses.
    pub fn new<S>(store: Arc<S>, queue: Arc<dyn HintQueue>, clock: Arc<dyn Clock>) -> Self
    where
        S: WaitStore + ResponseStore + 'static,
    {
        Self {
            waits: store.clone(),
            responses: store,
            queue,
            clock,
        }
    }
}
