//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! # Architecture
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │      Application        │
//!                    │  engine / dispatcher /  │
//!     ┌──────────────┤       reconciler        ├──────────────┐
//!     │              └─────────────────────────┘              │
//!     │                         │                             │
//!     ▼                         ▼                             ▼
//! ┌─────────┐            ┌─────────────┐              ┌───────────┐
//! │  Store  │            │ Hint Queue  │              │   Lock    │
//! │ Adapter │            │   Adapter   │              │  Adapter  │
//! └─────────┘            └─────────────┘              └───────────┘
//! ```
//!
//! # Available Ports
//!
//! - [`WaitStore`], [`ResponseStore`] - Durable join and response storage
//! - [`HintQueue`] - At-least-once hint transport
//! - [`DistributedLock`] - Singleton role election
//! - [`Clock`] - Time source
//! - [`NotifyCallback`] - Host-supplied completion handlers

pub mod inbound;
pub mod outbound;

pub use inbound::callback::NotifyCallback;
pub use outbound::clock::{Clock, SystemClock};
pub use outbound::lock::{DistributedLock, LockLease};
pub use outbound::queue::{Delivery, HintQueue};
pub use outbound::store::{PurgedWaits, ResponseStore, WaitStore};
