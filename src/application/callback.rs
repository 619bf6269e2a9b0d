//! Callback resolution and invocation.
//!
//! Joins persist a [`CallbackSpec`]; this registry maps its `kind` to the
//! host-supplied [`NotifyCallback`] at invocation time.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::info;

use crate::domain::{CallbackSpec, ResponseMap};
use crate::error::CallbackError;
use crate::port::NotifyCallback;

/// Kind registered by [`CallbackRegistry::with_log_callback`].
pub const LOG_CALLBACK_KIND: &str = "log";

/// Registry of callbacks keyed by kind.
#[derive(Default)]
pub struct CallbackRegistry {
    handlers: HashMap<String, Arc<dyn NotifyCallback>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with [`LogCallback`] under [`LOG_CALLBACK_KIND`].
    #[must_use]
    pub fn with_log_callback() -> Self {
        let mut registry = Self::new();
        registry.register(LOG_CALLBACK_KIND, Arc::new(LogCallback));
        registry
    }

    /// Register a handler, replacing any previous handler for `kind`.
    pub fn register(&mut self, kind: impl Into<String>, handler: Arc<dyn NotifyCallback>) {
        self.handlers.insert(kind.into(), handler);
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Resolve and run the callback for `spec`.
    ///
    /// Panics inside the handler are caught and reported as
    /// [`CallbackError::Panicked`].
    ///
    /// # Errors
    /// Returns [`CallbackError::UnknownKind`] if nothing is registered for
    /// `spec.kind`, or whatever the handler itself returns.
    pub fn invoke(
        &self,
        spec: &CallbackSpec,
        responses: &ResponseMap,
        is_error: bool,
    ) -> Result<(), CallbackError> {
        let handler = self
            .handlers
            .get(&spec.kind)
            .ok_or_else(|| CallbackError::UnknownKind(spec.kind.clone()))?;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            if is_error {
                handler.notify_error(spec, responses)
            } else {
                handler.notify(spec, responses)
            }
        }));

        match outcome {
            Ok(result) => result,
            Err(payload) => Err(CallbackError::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Callback that only logs the responses it receives.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCallback;

impl NotifyCallback for LogCallback {
    fn notify(&self, spec: &CallbackSpec, responses: &ResponseMap) -> Result<(), CallbackError> {
        info!(
            context = %spec.context,
            correlation_ids = ?responses.keys().collect::<Vec<_>>(),
            "Join completed"
        );
        Ok(())
    }

    fn notify_error(
        &self,
        spec: &CallbackSpec,
        responses: &ResponseMap,
    ) -> Result<(), CallbackError> {
        let failed: Vec<_> = responses
            .values()
            .filter(|r| r.is_error)
            .map(|r| r.correlation_id.as_str())
            .collect();
        info!(context = %spec.context, failed = ?failed, "Join completed with errors");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::callback::RecordingCallback;

    struct Panicking;

    impl NotifyCallback for Panicking {
        fn notify(&self, _: &CallbackSpec, _: &ResponseMap) -> Result<(), CallbackError> {
            panic!("boom");
        }

        fn notify_error(&self, _: &CallbackSpec, _: &ResponseMap) -> Result<(), CallbackError> {
            Ok(())
        }
    }

    #[test]
    fn unknown_kind_is_reported() {
        let registry = CallbackRegistry::new();
        let result = registry.invoke(&CallbackSpec::new("missing"), &ResponseMap::new(), false);
        assert_eq!(result, Err(CallbackError::UnknownKind("missing".into())));
    }

    #[test]
    fn invoke_routes_on_error_flag() {
        let recording = RecordingCallback::new();
        let mut registry = CallbackRegistry::new();
        registry.register("rec", Arc::new(recording.clone()));

        let spec = CallbackSpec::new("rec");
        registry.invoke(&spec, &ResponseMap::new(), false).unwrap();
        registry.invoke(&spec, &ResponseMap::new(), true).unwrap();

        assert_eq!(recording.success_count(), 1);
        assert_eq!(recording.error_count(), 1);
    }

    #[test]
    fn panics_become_callback_errors() {
        let mut registry = CallbackRegistry::new();
        registry.register("panics", Arc::new(Panicking));

        let result = registry.invoke(&CallbackSpec::new("panics"), &ResponseMap::new(), false);
        assert_eq!(result, Err(CallbackError::Panicked("boom".into())));
    }

    #[test]
    fn log_registry_exposes_log_kind() {
        let registry = CallbackRegistry::with_log_callback();
        assert_eq!(registry.kinds(), vec![LOG_CALLBACK_KIND]);
        assert!(registry
            .invoke(&CallbackSpec::new(LOG_CALLBACK_KIND), &ResponseMap::new(), true)
            .is_ok());
    }
}
