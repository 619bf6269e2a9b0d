//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe the infrastructure the engine coordinates
//! through: the durable store, the hint queue, the distributed lock, and
//! the time source.

pub mod clock;
pub mod lock;
pub mod queue;
pub mod store;
