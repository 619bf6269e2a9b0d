//! CLI module graph.

pub mod command;
pub mod reconcile;
pub mod run;
pub mod status;

pub use command::{Cli, Commands};
