//! Application services (use cases).
//!
//! - [`engine`] - [`WaitNotifyEngine`], the registration and notification API
//! - [`dispatcher`] - [`EventDispatcher`], which claims ready joins and runs
//!   their callbacks
//! - [`reconciler`] - [`Reconciler`], which repairs lost hints and removes
//!   orphaned responses
//! - [`callback`] - [`CallbackRegistry`] resolving persisted callback kinds

pub mod backend;
pub mod callback;
pub mod dispatcher;
pub mod engine;
pub mod reconciler;

pub use backend::Backend;
pub use callback::{CallbackRegistry, LogCallback, LOG_CALLBACK_KIND};
pub use dispatcher::{DispatchOutcome, DispatcherHandle, DispatcherSettings, EventDispatcher};
pub use engine::{NotifyOutcome, WaitNotifyEngine};
pub use reconciler::{ReconcileReport, Reconciler, ReconcilerHandle, ReconcilerSettings};
