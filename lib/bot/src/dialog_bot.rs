//! A bot driven by a root dialog.

use crate::bot::Bot;
use crate::error::{TurnError, dialog_failure, state_failure};
use async_trait::async_trait;
use colloquy_core::{ActivityType, Result, TurnContext};
use colloquy_dialog::{
    DIALOG_STATE_PROPERTY, Dialog, DialogError, DialogSet, DialogSettings, DialogState,
};
use colloquy_state::BotState;
use rootcause::Report;
use tracing::{debug, warn};

/// Runs a root dialog on every message.
///
/// Each turn continues the conversation's stack. If afterwards nothing is
/// active, no result came back and nothing has been said yet, the root
/// dialog is begun. A stack that is
/// corrupt or loops is cleared and saved straight away, so the next turn
/// starts over instead of failing the same way again.
#[derive(Debug)]
pub struct DialogBot {
    root_dialog_id: String,
    dialogs: DialogSet,
    conversation_state: BotState,
    welcome: Option<String>,
}

impl DialogBot {
    /// Creates a bot whose stack lives in `conversation_state`.
    #[must_use]
    pub fn new(conversation_state: BotState, root_dialog_id: impl Into<String>) -> Self {
        let dialogs =
            DialogSet::with_state(conversation_state.property_accessor(DIALOG_STATE_PROPERTY));
        Self {
            root_dialog_id: root_dialog_id.into(),
            dialogs,
            conversation_state,
            welcome: None,
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: DialogSettings) -> Self {
        self.dialogs = self.dialogs.with_settings(settings);
        self
    }

    /// Sets the text sent when someone joins the conversation.
    #[must_use]
    pub fn with_welcome(mut self, text: impl Into<String>) -> Self {
        self.welcome = Some(text.into());
        self
    }

    /// Registers a dialog in the root set.
    ///
    /// # Errors
    ///
    /// Returns [`DialogError::DuplicateId`] if the id is already taken.
    pub fn add_dialog(&mut self, dialog: impl Dialog + 'static) -> Result<(), DialogError> {
        self.dialogs.add(dialog)
    }

    #[must_use]
    pub fn dialogs(&self) -> &DialogSet {
        &self.dialogs
    }

    #[must_use]
    pub fn root_dialog_id(&self) -> &str {
        &self.root_dialog_id
    }

    async fn run_dialogs(&self, turn: &mut TurnContext) -> Result<(), DialogError> {
        let mut dc = self.dialogs.create_context(turn).await?;
        let result = dc.continue_dialog().await?;
        let idle = dc.stack_depth() == 0 && !result.is_waiting() && !result.has_result();
        if idle && !dc.turn().responded() {
            debug!(dialog_id = %self.root_dialog_id, "beginning root dialog");
            dc.begin_dialog(&self.root_dialog_id, None).await?;
        }
        dc.persist().await
    }

    /// Depth of the stack as persisted before this turn.
    async fn persisted_depth(&self, turn: &mut TurnContext) -> usize {
        let Some(accessor) = self.dialogs.state_accessor() else {
            return 0;
        };
        match accessor.get_optional(turn).await {
            Ok(state) => state.map_or(0, |state: DialogState| state.depth()),
            Err(_) => 0,
        }
    }

    async fn reset_stack(
        &self,
        turn: &mut TurnContext,
        report: Report<DialogError>,
    ) -> Report<TurnError> {
        let conversation = turn.conversation().clone();
        let dialog_id = report.current_context().dialog_id().map(str::to_string);
        let cause = report.current_context().kind();
        let stack_depth = self.persisted_depth(turn).await;
        warn!(
            %conversation,
            ?dialog_id,
            stack_depth,
            %cause,
            error = %report,
            "resetting dialog stack"
        );

        if let Err(clear) = self.dialogs.clear_state(turn).await {
            warn!(%conversation, error = %clear, "could not clear dialog stack");
            return dialog_failure(clear, &conversation);
        }
        if let Err(save) = self.conversation_state.save_changes(turn, true).await {
            warn!(%conversation, error = %save, "could not save cleared dialog stack");
            return state_failure(save, &conversation);
        }

        report.context(TurnError::DialogFailed {
            conversation_id: conversation.conversation_id,
            stack_depth,
            dialog_id,
            cause,
        })
    }
}

#[async_trait]
impl Bot for DialogBot {
    async fn on_turn(&self, turn: &mut TurnContext) -> Result<(), TurnError> {
        let activity = turn.activity();
        let activity_type = activity.activity_type;
        let joined = activity
            .members_added
            .iter()
            .any(|member| member.id != activity.recipient.id);
        match activity_type {
            ActivityType::Message => {}
            ActivityType::ConversationUpdate => {
                if let (true, Some(welcome)) = (joined, &self.welcome) {
                    turn.send_text(welcome.clone());
                }
                return Ok(());
            }
            ActivityType::EndOfConversation | ActivityType::Event => return Ok(()),
        }

        match self.run_dialogs(turn).await {
            Ok(()) => Ok(()),
            Err(report) if report.current_context().kind().requires_stack_reset() => {
                Err(self.reset_stack(turn, report).await)
            }
            Err(report) => Err(dialog_failure(report, turn.conversation())),
        }
    }
}
