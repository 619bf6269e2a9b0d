//! Implementations of ports (hexagonal adapters).
//!
//! - [`inbound`] - The operator command line
//! - [`outbound`] - Stores, queues and locks backing the engine

pub mod inbound;
pub mod outbound;
