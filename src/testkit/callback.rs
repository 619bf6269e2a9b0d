//! Recording callback for assertions on what the dispatcher ran.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::{CallbackSpec, ResponseMap};
use crate::error::CallbackError;
use crate::port::NotifyCallback;

/// One recorded call.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub spec: CallbackSpec,
    pub responses: ResponseMap,
    pub is_error: bool,
}

/// Callback that records every call. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingCallback {
    calls: Arc<Mutex<Vec<Invocation>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl RecordingCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call record itself and then fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }

    pub fn total(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn success_count(&self) -> usize {
        self.calls.lock().iter().filter(|c| !c.is_error).count()
    }

    pub fn error_count(&self) -> usize {
        self.calls.lock().iter().filter(|c| c.is_error).count()
    }

    fn record(
        &self,
        spec: &CallbackSpec,
        responses: &ResponseMap,
        is_error: bool,
    ) -> Result<(), CallbackError> {
        self.calls.lock().push(Invocation {
            spec: spec.clone(),
            responses: responses.clone(),
            is_error,
        });
        match self.failure.lock().as_ref() {
            Some(message) => Err(CallbackError::failed(message.clone())),
            None => Ok(()),
        }
    }
}

impl NotifyCallback for RecordingCallback {
    fn notify(&self, spec: &CallbackSpec, responses: &ResponseMap) -> Result<(), CallbackError> {
        self.record(spec, responses, false)
    }

    fn notify_error(
        &self,
        spec: &CallbackSpec,
        responses: &ResponseMap,
    ) -> Result<(), CallbackError> {
        self.record(spec, responses, true)
    }
}
