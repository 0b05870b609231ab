//! The dialog abstraction.
//!
//! A [`Dialog`] is a named unit of conversation logic. The engine drives it
//! through four entry points:
//!
//! - `begin_dialog`: a new frame was pushed for it
//! - `continue_dialog`: it is the active frame and a new turn arrived
//! - `resume_dialog`: a child frame above it ended with a result
//! - `end_dialog`: its frame is being popped
//!
//! Dialog definitions are stateless and shared across conversations; all
//! per-invocation state lives in the frame's [`DialogInstance`].

use crate::context::DialogContext;
use crate::error::DialogError;
use crate::set::DialogSet;
use async_trait::async_trait;
use colloquy_core::{Result, TurnContext};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Whether the stack still expects input after a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogTurnStatus {
    /// The active dialog is waiting for the next turn.
    Waiting,
    /// The dispatched dialog finished; the caller may consume `result`.
    Complete,
}

/// Outcome of a dialog dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogTurnResult {
    /// Waiting or complete.
    pub status: DialogTurnStatus,
    /// The value the finished dialog ended with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
}

impl DialogTurnResult {
    /// A result signalling that the stack waits for input.
    #[must_use]
    pub fn waiting() -> Self {
        Self {
            status: DialogTurnStatus::Waiting,
            result: None,
        }
    }

    /// A result signalling completion.
    #[must_use]
    pub fn complete(result: Option<JsonValue>) -> Self {
        Self {
            status: DialogTurnStatus::Complete,
            result,
        }
    }

    /// Returns true if a dialog is still waiting for input.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.status == DialogTurnStatus::Waiting
    }

    /// Returns true if the dispatch completed with a value.
    #[must_use]
    pub fn has_result(&self) -> bool {
        self.status == DialogTurnStatus::Complete && self.result.is_some()
    }

    /// Decodes the result value.
    ///
    /// # Errors
    ///
    /// Returns [`DialogError::Serialization`] if the value has another shape.
    pub fn result_as<T: DeserializeOwned>(&self) -> Result<Option<T>, DialogError> {
        self.result
            .clone()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| {
                DialogError::Serialization {
                    dialog_id: String::new(),
                    reason: e.to_string(),
                }
                .into()
            })
    }
}

/// Why a dialog entry point was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogReason {
    /// The dialog was just started.
    BeginCalled,
    /// A new turn arrived for the active dialog.
    ContinueCalled,
    /// The dialog, or a child of it, ended normally.
    EndCalled,
    /// The dialog was replaced by another one.
    ReplaceCalled,
    /// The whole stack was cancelled.
    CancelCalled,
    /// A waterfall step advanced to the next step.
    NextCalled,
}

/// One frame of the dialog stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogInstance {
    /// Id of the dialog that owns the frame.
    pub id: String,
    /// Private state of this invocation.
    #[serde(default)]
    pub state: Map<String, JsonValue>,
}

impl DialogInstance {
    /// Creates a frame with empty state.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: Map::new(),
        }
    }

    /// Reads a typed value from the frame's state.
    ///
    /// # Errors
    ///
    /// Returns [`DialogError::CorruptDialogState`] if the stored value has
    /// another shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DialogError> {
        let Some(raw) = self.state.get(key) else {
            return Ok(None);
        };
        serde_json::from_value(raw.clone()).map(Some).map_err(|e| {
            DialogError::CorruptDialogState {
                dialog_id: self.id.clone(),
                reason: format!("state value '{key}' is malformed: {e}"),
            }
            .into()
        })
    }

    /// Writes a typed value into the frame's state.
    ///
    /// # Errors
    ///
    /// Returns [`DialogError::Serialization`] if the value cannot be serialized.
    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), DialogError> {
        let raw = serde_json::to_value(value).map_err(|e| DialogError::Serialization {
            dialog_id: self.id.clone(),
            reason: e.to_string(),
        })?;
        self.state.insert(key.to_string(), raw);
        Ok(())
    }
}

/// A unit of conversation logic.
///
/// Default entry points: continuing or resuming a dialog ends it (passing a
/// child's result through), re-prompting does nothing, and the end hook
/// does nothing.
#[async_trait]
pub trait Dialog: Send + Sync {
    /// Returns the id the dialog is registered under.
    fn id(&self) -> &str;

    /// Starts the dialog. Its frame is already on top of the stack.
    async fn begin_dialog(
        &self,
        dc: &mut DialogContext<'_>,
        options: Option<JsonValue>,
    ) -> Result<DialogTurnResult, DialogError>;

    /// Handles a new turn while this dialog is active.
    async fn continue_dialog(
        &self,
        dc: &mut DialogContext<'_>,
    ) -> Result<DialogTurnResult, DialogError> {
        dc.end_dialog(None).await
    }

    /// Handles the end of a child dialog.
    async fn resume_dialog(
        &self,
        dc: &mut DialogContext<'_>,
        _reason: DialogReason,
        result: Option<JsonValue>,
    ) -> Result<DialogTurnResult, DialogError> {
        dc.end_dialog(result).await
    }

    /// Re-renders whatever the dialog last asked, without consuming input.
    async fn reprompt_dialog(
        &self,
        _turn: &mut TurnContext,
        _instance: &DialogInstance,
    ) -> Result<(), DialogError> {
        Ok(())
    }

    /// Called as the dialog's frame is popped.
    async fn end_dialog(
        &self,
        _turn: &mut TurnContext,
        _instance: &DialogInstance,
        _reason: DialogReason,
    ) -> Result<(), DialogError> {
        Ok(())
    }

    /// Returns the nested dialog set for container dialogs.
    ///
    /// Frames pushed while a container's frame is on the stack resolve
    /// their ids in this set first.
    fn dialogs(&self) -> Option<&DialogSet> {
        None
    }
}
