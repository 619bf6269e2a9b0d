//! SQLite persistence adapters.
//!
//! Provides SQLite-backed implementations of the store, queue and lock
//! ports using Diesel ORM. All three can share one database file and pool.

pub mod database;
pub mod lock;
pub mod queue;
pub mod store;

pub use lock::SqliteLock;
pub use queue::SqliteHintQueue;
pub use store::{SqliteStore, StoreStats};
