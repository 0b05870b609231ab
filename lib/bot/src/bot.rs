//! The application hook.

use crate::error::TurnError;
use async_trait::async_trait;
use colloquy_core::{Result, TurnContext};

/// Application logic run once per inbound activity.
///
/// Replies are queued on the turn; state touched through a
/// [`BotState`](colloquy_state::BotState) registered with the adapter is
/// saved after `on_turn` returns.
#[async_trait]
pub trait Bot: Send + Sync {
    /// Handles one turn.
    async fn on_turn(&self, turn: &mut TurnContext) -> Result<(), TurnError>;
}
