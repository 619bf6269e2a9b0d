//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`clock`] - [`ManualClock`](clock::ManualClock), a clock tests advance by hand.
//! - [`callback`] - [`RecordingCallback`](callback::RecordingCallback), which
//!   remembers every invocation and can be told to fail.
//! - [`config`] - Canonical settings for the engine, dispatcher and reconciler.
//! - [`faulty`] - [`FaultyStore`](faulty::FaultyStore), a store that fails on
//!   demand.
//! - [`harness`] - [`MemoryHarness`](harness::MemoryHarness), the full engine
//!   wired to in-memory adapters.

pub mod callback;
pub mod clock;
pub mod config;
pub mod faulty;
pub mod harness;
