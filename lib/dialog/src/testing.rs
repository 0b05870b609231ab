//! Test doubles and a turn harness for the dialog engine.

use crate::context::DialogContext;
use crate::dialog::{Dialog, DialogInstance, DialogReason, DialogTurnResult};
use crate::error::{DialogError, state_access};
use crate::set::DialogSet;
use crate::settings::DialogSettings;
use crate::stack::{DIALOG_STATE_PROPERTY, DialogState};
use async_trait::async_trait;
use colloquy_core::{Activity, ActivityType, ChannelAccount, ConversationRef, Result, TurnContext};
use colloquy_state::{BotState, MemoryStorage};
use serde_json::{Value as JsonValue, json};
use std::sync::{Arc, Mutex};

/// Runs turns against one in-memory conversation.
pub(crate) struct Harness {
    pub set: DialogSet,
    pub state: BotState,
    storage: MemoryStorage,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(DialogSettings::default())
    }

    pub fn with_settings(settings: DialogSettings) -> Self {
        Self::build(MemoryStorage::new(), settings)
    }

    /// A harness with a fresh, empty dialog set over the same storage.
    pub fn new_sharing(other: &Harness) -> Self {
        Self::build(other.storage.clone(), DialogSettings::default())
    }

    fn build(storage: MemoryStorage, settings: DialogSettings) -> Self {
        let state = BotState::conversation(Arc::new(storage.clone()));
        let set = DialogSet::with_state(state.property_accessor(DIALOG_STATE_PROPERTY))
            .with_settings(settings);
        Self { set, state, storage }
    }

    pub fn add(&mut self, dialog: impl Dialog + 'static) {
        self.set.add(dialog).expect("register dialog");
    }

    pub fn message(text: &str) -> TurnContext {
        TurnContext::new(Activity::message(
            ConversationRef::new("test", "conv-1"),
            ChannelAccount::new("user"),
            ChannelAccount::new("bot"),
            text,
        ))
    }

    pub fn event() -> TurnContext {
        let mut activity = Activity::message(
            ConversationRef::new("test", "conv-1"),
            ChannelAccount::new("user"),
            ChannelAccount::new("bot"),
            "",
        );
        activity.activity_type = ActivityType::Event;
        activity.text = None;
        TurnContext::new(activity)
    }

    /// Begins `dialog_id` on a turn carrying `"start"`.
    pub async fn begin(
        &self,
        dialog_id: &str,
        options: Option<JsonValue>,
    ) -> Result<(DialogTurnResult, Vec<String>), DialogError> {
        let mut turn = Self::message("start");
        let mut dc = self.set.create_context(&mut turn).await?;
        let result = dc.begin_dialog(dialog_id, options).await?;
        dc.persist().await?;
        self.finish(turn).await.map(|replies| (result, replies))
    }

    /// Continues the stack with a message.
    pub async fn send(&self, text: &str) -> Result<(DialogTurnResult, Vec<String>), DialogError> {
        self.deliver(Self::message(text)).await
    }

    /// Continues the stack with an arbitrary turn.
    pub async fn deliver(
        &self,
        mut turn: TurnContext,
    ) -> Result<(DialogTurnResult, Vec<String>), DialogError> {
        let mut dc = self.set.create_context(&mut turn).await?;
        let result = dc.continue_dialog().await?;
        dc.persist().await?;
        self.finish(turn).await.map(|replies| (result, replies))
    }

    pub async fn cancel(&self) -> Result<DialogTurnResult, DialogError> {
        let mut turn = Self::message("cancel");
        let mut dc = self.set.create_context(&mut turn).await?;
        let result = dc.cancel_all_dialogs().await?;
        dc.persist().await?;
        self.finish(turn).await.map(|_| result)
    }

    pub async fn reprompt(&self) -> Result<Vec<String>, DialogError> {
        let mut turn = Self::message("reprompt");
        let mut dc = self.set.create_context(&mut turn).await?;
        dc.reprompt_dialog().await?;
        dc.persist().await?;
        self.finish(turn).await
    }

    /// Reads the persisted stack.
    pub async fn stack(&self) -> DialogState {
        let mut turn = Self::message("");
        self.state
            .property_accessor::<DialogState>(DIALOG_STATE_PROPERTY)
            .get(&mut turn, DialogState::default)
            .await
            .expect("read dialog state")
    }

    async fn finish(&self, mut turn: TurnContext) -> Result<Vec<String>, DialogError> {
        self.state
            .save_changes(&mut turn, false)
            .await
            .map_err(|report| state_access(report, self.state.name()))?;
        Ok(turn
            .take_responses()
            .iter()
            .map(|activity| activity.text().to_string())
            .collect())
    }
}

/// Echoes its begin options, then ends with the next message it receives.
pub(crate) struct EchoDialog {
    id: String,
}

impl EchoDialog {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

#[async_trait]
impl Dialog for EchoDialog {
    fn id(&self) -> &str {
        &self.id
    }

    async fn begin_dialog(
        &self,
        dc: &mut DialogContext<'_>,
        options: Option<JsonValue>,
    ) -> Result<DialogTurnResult, DialogError> {
        if let Some(JsonValue::String(text)) = options {
            dc.turn_mut().send_text(text);
        }
        Ok(DialogTurnResult::waiting())
    }

    async fn continue_dialog(
        &self,
        dc: &mut DialogContext<'_>,
    ) -> Result<DialogTurnResult, DialogError> {
        let text = dc.turn().activity().text().to_string();
        dc.turn_mut().send_text(format!("{}: {text}", self.id));
        dc.end_dialog(Some(json!(text))).await
    }
}

/// Waits forever and records every end-hook reason.
pub(crate) struct RecordingDialog {
    id: String,
    ends: Arc<Mutex<Vec<DialogReason>>>,
}

impl RecordingDialog {
    pub fn new(id: &str) -> (Self, Arc<Mutex<Vec<DialogReason>>>) {
        let ends = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                id: id.to_string(),
                ends: Arc::clone(&ends),
            },
            ends,
        )
    }
}

#[async_trait]
impl Dialog for RecordingDialog {
    fn id(&self) -> &str {
        &self.id
    }

    async fn begin_dialog(
        &self,
        _dc: &mut DialogContext<'_>,
        _options: Option<JsonValue>,
    ) -> Result<DialogTurnResult, DialogError> {
        Ok(DialogTurnResult::waiting())
    }

    async fn continue_dialog(
        &self,
        _dc: &mut DialogContext<'_>,
    ) -> Result<DialogTurnResult, DialogError> {
        Ok(DialogTurnResult::waiting())
    }

    async fn resume_dialog(
        &self,
        _dc: &mut DialogContext<'_>,
        _reason: DialogReason,
        _result: Option<JsonValue>,
    ) -> Result<DialogTurnResult, DialogError> {
        Ok(DialogTurnResult::waiting())
    }

    async fn end_dialog(
        &self,
        _turn: &mut TurnContext,
        _instance: &DialogInstance,
        reason: DialogReason,
    ) -> Result<(), DialogError> {
        self.ends.lock().expect("lock").push(reason);
        Ok(())
    }
}

/// Immediately replaces itself with another dialog.
pub(crate) struct ReplaceWith {
    id: String,
    target: String,
}

impl ReplaceWith {
    pub fn new(id: &str, target: &str) -> Self {
        Self {
            id: id.to_string(),
            target: target.to_string(),
        }
    }
}

#[async_trait]
impl Dialog for ReplaceWith {
    fn id(&self) -> &str {
        &self.id
    }

    async fn begin_dialog(
        &self,
        dc: &mut DialogContext<'_>,
        options: Option<JsonValue>,
    ) -> Result<DialogTurnResult, DialogError> {
        dc.replace_dialog(&self.target, options).await
    }
}
