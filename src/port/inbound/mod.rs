//! Inbound (driving) ports implemented by host applications.
//!
//! - [`callback`]: Handlers invoked when a join completes

pub mod callback;
