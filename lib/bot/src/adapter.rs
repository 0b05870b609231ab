//! The turn boundary.
//!
//! [`TurnAdapter::process_activity`] runs one inbound activity through a
//! [`Bot`] and saves every registered state scope. If a concurrent turn
//! saved the same record first, the turn's replies are discarded and the
//! whole turn is run again against freshly loaded state.

use crate::bot::Bot;
use crate::error::{TurnError, state_failure};
use colloquy_core::{Activity, Result, TurnContext};
use colloquy_state::BotState;
use serde::Deserialize;
use tracing::{info, instrument, warn};

/// Turn-boundary settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AdapterSettings {
    /// How many times a conflicting turn is re-run before giving up.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
}

fn default_max_conflict_retries() -> u32 {
    3
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            max_conflict_retries: default_max_conflict_retries(),
        }
    }
}

/// Runs turns and owns the end-of-turn save.
#[derive(Debug, Clone, Default)]
pub struct TurnAdapter {
    states: Vec<BotState>,
    settings: AdapterSettings,
}

impl TurnAdapter {
    #[must_use]
    pub fn new(settings: AdapterSettings) -> Self {
        Self {
            states: Vec::new(),
            settings,
        }
    }

    /// Registers a state scope to save at the end of every turn.
    #[must_use]
    pub fn use_state(mut self, state: BotState) -> Self {
        self.states.push(state);
        self
    }

    #[must_use]
    pub fn settings(&self) -> &AdapterSettings {
        &self.settings
    }

    /// Processes one inbound activity and returns the replies.
    ///
    /// Replies are only returned once every state scope has been saved.
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::Conflict`] once the retry budget is spent, or
    /// whatever the bot or a state save failed with.
    #[instrument(
        skip(self, activity, bot),
        fields(conversation = %activity.conversation, activity_type = ?activity.activity_type)
    )]
    pub async fn process_activity(
        &self,
        activity: Activity,
        bot: &dyn Bot,
    ) -> Result<Vec<Activity>, TurnError> {
        let max_retries = self.settings.max_conflict_retries;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let mut turn = TurnContext::new(activity.clone());
            info!(turn_id = %turn.id(), attempt, "turn started");

            let report = match self.run_turn(&mut turn, bot).await {
                Ok(()) => {
                    let replies = turn.take_responses();
                    info!(turn_id = %turn.id(), replies = replies.len(), "turn completed");
                    return Ok(replies);
                }
                Err(report) => report,
            };

            if !report.current_context().kind().is_retryable() {
                return Err(report);
            }
            if attempt > max_retries {
                warn!(attempt, max_retries, "giving up on conflicting turn");
                return Err(report.context(TurnError::Conflict {
                    conversation_id: activity.conversation.conversation_id.clone(),
                    attempts: attempt,
                }));
            }
            warn!(
                turn_id = %turn.id(),
                attempt,
                max_retries,
                discarded = turn.responses().len(),
                error = %report,
                "state changed underneath the turn, retrying"
            );
        }
    }

    async fn run_turn(&self, turn: &mut TurnContext, bot: &dyn Bot) -> Result<(), TurnError> {
        bot.on_turn(turn).await?;
        for state in &self.states {
            state
                .save_changes(turn, false)
                .await
                .map_err(|report| state_failure(report, turn.conversation()))?;
        }
        Ok(())
    }
}
