//! In-memory adapters for tests and single-process embedding.

pub mod lock;
pub mod queue;
pub mod store;

pub use lock::MemoryLock;
pub use queue::MemoryHintQueue;
pub use store::MemoryStore;
