//! waitnotify - durable wait/notify joins over asynchronous results.
//!
//! A component registers a callback that must run once every one of a set of
//! correlation IDs has reported a result. Producers report results with
//! `notify`, in any order, from any process. The join fires exactly once
//! per successful claim, after all results are present.
//!
//! # Architecture
//!
//! Hexagonal, in three layers:
//!
//! - **`domain`** - Joins, responses, hints and their invariants
//! - **`port`** - Store, queue, lock and clock traits, plus the callback trait
//!   hosts implement
//! - **`application`** - [`WaitNotifyEngine`](application::WaitNotifyEngine),
//!   [`EventDispatcher`](application::EventDispatcher) and
//!   [`Reconciler`](application::Reconciler)
//!
//! Adapters live in [`adapter`]: in-memory implementations for tests and
//! single-process use, and SQLite implementations (Diesel) for everything
//! else. [`infrastructure`] holds configuration and the composition root.
//!
//! # Modules
//!
//! - [`domain`] - Storage-agnostic types
//! - [`port`] - Trait seams
//! - [`application`] - Engine, dispatcher, reconciler, callback registry
//! - [`adapter`] - Memory and SQLite adapters, operator CLI
//! - [`infrastructure`] - Config loading, logging, bootstrap
//! - [`error`] - Error types for the crate
//!
//! # Features
//!
//! - `testkit` - Expose [`testkit`] helpers to integration tests
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use waitnotify::adapter::outbound::memory::{MemoryHintQueue, MemoryStore};
//! use waitnotify::application::{Backend, WaitNotifyEngine};
//! use waitnotify::domain::{CallbackSpec, Retention};
//! use waitnotify::port::SystemClock;
//!
//! # async fn demo() -> waitnotify::error::Result<()> {
//! let backend = Backend::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryHintQueue::new(std::time::Duration::from_secs(60))),
//!     Arc::new(SystemClock),
//! );
//! let engine = WaitNotifyEngine::new(backend, Retention::default());
//!
//! engine
//!     .wait_for_all(CallbackSpec::new("log"), ["job-1", "job-2"])
//!     .await?;
//! engine.done_with("job-1", json!({"rows": 10})).await?;
//! engine.done_with_error("job-2", json!({"reason": "timeout"})).await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
