//! Core domain types and utilities for the colloquy conversation engine.
//!
//! This crate provides the foundational types shared by every layer:
//! the inbound/outbound [`Activity`] model, the per-turn [`TurnContext`],
//! strongly-typed ids, and the error classification used across crates.

pub mod activity;
pub mod error;
pub mod id;
pub mod turn;

pub use activity::{Activity, ActivityType, ChannelAccount, ConversationRef};
pub use error::{ErrorKind, Result};
pub use id::{ActivityId, ParseIdError, TurnId};
pub use turn::TurnContext;
