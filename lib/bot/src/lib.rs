//! The turn boundary for colloquy.
//!
//! This crate provides:
//!
//! - **Application hook**: the [`Bot`] trait
//! - **Turn processing**: [`TurnAdapter`] runs a turn, saves state and
//!   retries turns that lost an optimistic-concurrency race
//! - **Dialog bots**: [`DialogBot`] runs a root dialog with a stack-reset policy
//! - **Test support**: [`testing::TestFlow`] scripts conversations

pub mod adapter;
pub mod bot;
pub mod dialog_bot;
pub mod error;
pub mod testing;

#[cfg(test)]
mod scenarios;

pub use adapter::{AdapterSettings, TurnAdapter};
pub use bot::Bot;
pub use dialog_bot::DialogBot;
pub use error::{TurnError, dialog_failure, state_failure};
