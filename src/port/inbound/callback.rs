//! Callback port implemented by host applications.
//!
//! A join persists a [`CallbackSpec`]; when the join completes the
//! dispatcher resolves `spec.kind` to a registered [`NotifyCallback`] and
//! invokes it with the stored context and the full response map.
//!
//! Callbacks run inline on the dispatcher while it holds the claim lease, so
//! they must be fast and synchronous. A callback that outlives the lease
//! risks a second worker claiming the same join.

use crate::domain::{CallbackSpec, ResponseMap};
use crate::error::CallbackError;

pub trait NotifyCallback: Send + Sync {
    /// Every correlation ID succeeded.
    ///
    /// # Errors
    /// Any error is recorded as a failure of the join; it is never retried.
    fn notify(&self, spec: &CallbackSpec, responses: &ResponseMap) -> Result<(), CallbackError>;

    /// At least one correlation ID reported an error. `responses` still
    /// contains every response, successful ones included.
    ///
    /// # Errors
    /// Any error is recorded as a failure of the join; it is never retried.
    fn notify_error(
        &self,
        spec: &CallbackSpec,
        responses: &ResponseMap,
    ) -> Result<(), CallbackError>;
}
