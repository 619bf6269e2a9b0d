//! Storage-agnostic wait/notify types.
//!
//! - [`wait`] - Joins ([`WaitInstance`]) and their [`WaitStatus`] lifecycle
//! - [`response`] - Write-once [`Response`] records and the [`ResponseMap`]
//!   handed to callbacks
//! - [`hint`] - Ephemeral [`DispatchHint`] queue messages
//! - [`callback`] - Persisted [`CallbackSpec`] descriptions
//! - [`failure`] - [`WaitInstanceError`] diagnostic records
//! - [`retention`] - TTL windows

pub mod callback;
pub mod error;
pub mod failure;
pub mod hint;
pub mod id;
pub mod response;
pub mod retention;
pub mod wait;

pub use callback::CallbackSpec;
pub use error::DomainError;
pub use failure::WaitInstanceError;
pub use hint::DispatchHint;
pub use id::{CorrelationId, WaitInstanceId};
pub use response::{any_error, InsertOutcome, Response, ResponseCursor, ResponseMap};
pub use retention::Retention;
pub use wait::{WaitInstance, WaitStatus, DEFAULT_PUBLISHER};
