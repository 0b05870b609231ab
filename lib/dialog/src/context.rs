//! The dialog execution engine.
//!
//! A [`DialogContext`] binds one conversation's stack to one turn. The
//! stack is flat: container dialogs do not own nested stacks, their
//! children are pushed as ordinary frames above them. Alongside the
//! serializable frames the context keeps the resolved definition of every
//! frame, so ids are looked up once per frame rather than on every
//! dispatch.
//!
//! Dispatches nest: ending a frame resumes its parent inside the same call,
//! which may begin or end further frames. Every begin, continue and resume
//! counts against [`DialogSettings::max_dispatch_depth`] while in flight,
//! which bounds dialogs that keep ending or replacing each other without
//! ever waiting for input.
//!
//! [`DialogSettings::max_dispatch_depth`]: crate::DialogSettings::max_dispatch_depth

use crate::dialog::{Dialog, DialogInstance, DialogReason, DialogTurnResult};
use crate::error::{DialogError, state_access};
use crate::prompt::PromptOptions;
use crate::set::DialogSet;
use crate::stack::DialogState;
use colloquy_core::{Result, TurnContext};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolves `dialog_id` for a frame pushed above `frames`.
///
/// The nearest container frame is searched first, then enclosing
/// containers outward, then the root set.
fn resolve(root: &DialogSet, frames: &[Arc<dyn Dialog>], dialog_id: &str) -> Option<Arc<dyn Dialog>> {
    frames
        .iter()
        .rev()
        .filter_map(|frame| frame.dialogs())
        .find_map(|set| set.find(dialog_id))
        .or_else(|| root.find(dialog_id))
}

/// One conversation's dialog stack, bound to the current turn.
pub struct DialogContext<'t> {
    dialogs: &'t DialogSet,
    turn: &'t mut TurnContext,
    state: DialogState,
    frames: Vec<Arc<dyn Dialog>>,
    dispatch_depth: usize,
}

impl<'t> DialogContext<'t> {
    /// Binds a stack to a turn, resolving every persisted frame.
    ///
    /// # Errors
    ///
    /// Returns [`DialogError::CorruptDialogState`] if a frame references a
    /// dialog that is no longer reachable.
    pub fn new(
        dialogs: &'t DialogSet,
        turn: &'t mut TurnContext,
        state: DialogState,
    ) -> Result<Self, DialogError> {
        let mut frames: Vec<Arc<dyn Dialog>> = Vec::with_capacity(state.stack.len());
        for (index, instance) in state.stack.iter().enumerate() {
            let dialog = resolve(dialogs, &frames, &instance.id).ok_or_else(|| {
                DialogError::CorruptDialogState {
                    dialog_id: instance.id.clone(),
                    reason: format!("frame {index} references a dialog that is not registered"),
                }
            })?;
            frames.push(dialog);
        }
        Ok(Self {
            dialogs,
            turn,
            state,
            frames,
            dispatch_depth: 0,
        })
    }

    /// Returns the turn.
    #[must_use]
    pub fn turn(&self) -> &TurnContext {
        &*self.turn
    }

    /// Returns the turn for sending replies or reading turn state.
    pub fn turn_mut(&mut self) -> &mut TurnContext {
        &mut *self.turn
    }

    /// Returns the root dialog set.
    #[must_use]
    pub fn dialogs(&self) -> &DialogSet {
        self.dialogs
    }

    /// Returns the stack.
    #[must_use]
    pub fn state(&self) -> &DialogState {
        &self.state
    }

    /// Returns the number of frames.
    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.state.stack.len()
    }

    /// Returns the id of the active dialog.
    #[must_use]
    pub fn active_dialog_id(&self) -> Option<&str> {
        self.state.active().map(|frame| frame.id.as_str())
    }

    /// Returns the active frame.
    #[must_use]
    pub fn active_instance(&self) -> Option<&DialogInstance> {
        self.state.stack.last()
    }

    /// Returns the active frame for mutation.
    pub fn active_instance_mut(&mut self) -> Option<&mut DialogInstance> {
        self.state.stack.last_mut()
    }

    /// Returns the frame at `index` (0 is the root).
    #[must_use]
    pub fn instance(&self, index: usize) -> Option<&DialogInstance> {
        self.state.stack.get(index)
    }

    /// Returns the frame at `index` for mutation.
    pub fn instance_mut(&mut self, index: usize) -> Option<&mut DialogInstance> {
        self.state.stack.get_mut(index)
    }

    /// Resolves a dialog id as a frame pushed now would.
    #[must_use]
    pub fn find_dialog(&self, dialog_id: &str) -> Option<Arc<dyn Dialog>> {
        resolve(self.dialogs, &self.frames, dialog_id)
    }

    /// Pushes a new frame for `dialog_id` and starts it.
    ///
    /// # Errors
    ///
    /// Returns [`DialogError::NotFound`] if the id does not resolve, or
    /// whatever the started dialog fails with.
    pub async fn begin_dialog(
        &mut self,
        dialog_id: &str,
        options: Option<JsonValue>,
    ) -> Result<DialogTurnResult, DialogError> {
        let dialog = self.find_dialog(dialog_id).ok_or_else(|| DialogError::NotFound {
            dialog_id: dialog_id.to_string(),
        })?;
        self.start(dialog, options).await
    }

    /// Starts a prompt with typed options.
    ///
    /// # Errors
    ///
    /// Same as [`begin_dialog`](Self::begin_dialog).
    pub async fn prompt(
        &mut self,
        dialog_id: &str,
        options: PromptOptions,
    ) -> Result<DialogTurnResult, DialogError> {
        let options = serde_json::to_value(options).map_err(|e| DialogError::InvalidOptions {
            dialog_id: dialog_id.to_string(),
            reason: e.to_string(),
        })?;
        self.begin_dialog(dialog_id, Some(options)).await
    }

    /// Forwards the turn to the active dialog.
    ///
    /// With an empty stack this completes immediately without a result.
    ///
    /// # Errors
    ///
    /// Returns whatever the active dialog fails with.
    pub async fn continue_dialog(&mut self) -> Result<DialogTurnResult, DialogError> {
        let Some(dialog) = self.frames.last().cloned() else {
            return Ok(DialogTurnResult::complete(None));
        };
        debug!(dialog_id = %dialog.id(), depth = self.stack_depth(), "continuing active dialog");
        self.enter(dialog.id())?;
        let outcome = dialog.continue_dialog(self).await;
        self.exit();
        outcome
    }

    /// Pops the active frame and resumes its parent with `result`.
    ///
    /// When the popped frame was the root, the dispatch completes with
    /// `result`.
    ///
    /// # Errors
    ///
    /// Returns whatever the end hook or the resumed parent fails with.
    pub async fn end_dialog(
        &mut self,
        result: Option<JsonValue>,
    ) -> Result<DialogTurnResult, DialogError> {
        self.pop(DialogReason::EndCalled).await?;
        let Some(parent) = self.frames.last().cloned() else {
            return Ok(DialogTurnResult::complete(result));
        };
        debug!(dialog_id = %parent.id(), depth = self.stack_depth(), "resuming parent dialog");
        self.enter(parent.id())?;
        let outcome = parent
            .resume_dialog(self, DialogReason::EndCalled, result)
            .await;
        self.exit();
        outcome
    }

    /// Replaces the active frame with a new frame for `dialog_id`.
    ///
    /// The parent is not resumed in between. The id is resolved before
    /// anything is popped, so an unknown id leaves the stack untouched.
    ///
    /// # Errors
    ///
    /// Returns [`DialogError::NotFound`] if the id does not resolve, or
    /// whatever the end hook or the new dialog fails with.
    pub async fn replace_dialog(
        &mut self,
        dialog_id: &str,
        options: Option<JsonValue>,
    ) -> Result<DialogTurnResult, DialogError> {
        let below = self.frames.len().saturating_sub(1);
        let dialog = resolve(self.dialogs, &self.frames[..below], dialog_id).ok_or_else(|| {
            DialogError::NotFound {
                dialog_id: dialog_id.to_string(),
            }
        })?;
        self.pop(DialogReason::ReplaceCalled).await?;
        self.start(dialog, options).await
    }

    /// Pops every frame and completes without a result.
    ///
    /// # Errors
    ///
    /// Returns whatever an end hook fails with.
    pub async fn cancel_all_dialogs(&mut self) -> Result<DialogTurnResult, DialogError> {
        while !self.frames.is_empty() {
            self.pop(DialogReason::CancelCalled).await?;
        }
        Ok(DialogTurnResult::complete(None))
    }

    /// Asks the active dialog to re-render its prompt.
    ///
    /// # Errors
    ///
    /// Returns whatever the active dialog fails with.
    pub async fn reprompt_dialog(&mut self) -> Result<(), DialogError> {
        let (Some(dialog), Some(instance)) = (self.frames.last().cloned(), self.state.active().cloned())
        else {
            return Ok(());
        };
        dialog.reprompt_dialog(&mut *self.turn, &instance).await
    }

    /// Stages the stack in conversation state, consuming the context.
    ///
    /// The stack reaches storage when conversation state is saved at the
    /// end of the turn.
    ///
    /// # Errors
    ///
    /// Returns an error if the set has no state property or staging fails.
    pub async fn persist(self) -> Result<(), DialogError> {
        let accessor = self
            .dialogs
            .state_accessor()
            .ok_or(DialogError::NoStateAccessor)?;
        let turn = self.turn;
        accessor
            .set(turn, &self.state)
            .await
            .map_err(|report| state_access(report, accessor.name()))
    }

    /// Releases the turn and returns the stack without staging it.
    #[must_use]
    pub fn into_state(self) -> DialogState {
        self.state
    }

    async fn start(
        &mut self,
        dialog: Arc<dyn Dialog>,
        options: Option<JsonValue>,
    ) -> Result<DialogTurnResult, DialogError> {
        self.enter(dialog.id())?;
        self.state.stack.push(DialogInstance::new(dialog.id()));
        self.frames.push(Arc::clone(&dialog));
        debug!(dialog_id = %dialog.id(), depth = self.stack_depth(), "pushed dialog");
        let outcome = dialog.begin_dialog(self, options).await;
        self.exit();
        outcome
    }

    async fn pop(&mut self, reason: DialogReason) -> Result<(), DialogError> {
        let (Some(instance), Some(dialog)) = (self.state.stack.pop(), self.frames.pop()) else {
            return Ok(());
        };
        debug!(dialog_id = %instance.id, depth = self.stack_depth(), ?reason, "popped dialog");
        dialog.end_dialog(&mut *self.turn, &instance, reason).await
    }

    fn enter(&mut self, dialog_id: &str) -> Result<(), DialogError> {
        let max = self.dialogs.settings().max_dispatch_depth;
        if self.dispatch_depth >= max {
            warn!(dialog_id, depth = self.dispatch_depth, max, "dispatch depth exceeded");
            return Err(DialogError::InternalLoop {
                dialog_id: dialog_id.to_string(),
                depth: self.dispatch_depth + 1,
            }
            .into());
        }
        self.dispatch_depth += 1;
        Ok(())
    }

    fn exit(&mut self) {
        self.dispatch_depth = self.dispatch_depth.saturating_sub(1);
    }
}

impl std::fmt::Debug for DialogContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogContext")
            .field("turn", &self.turn.id())
            .field("stack", &self.state.stack)
            .field("dispatch_depth", &self.dispatch_depth)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::DialogSettings;
    use crate::testing::{EchoDialog, Harness, RecordingDialog, ReplaceWith};
    use colloquy_core::ErrorKind;
    use serde_json::json;

    #[tokio::test]
    async fn empty_stack_completes_without_result() {
        let harness = Harness::new();
        let (result, replies) = harness.send("hello").await.unwrap();
        assert!(!result.is_waiting());
        assert!(!result.has_result());
        assert!(replies.is_empty());
    }

    #[tokio::test]
    async fn begin_unknown_dialog_is_not_found() {
        let harness = Harness::new();
        let err = harness.begin("missing", None).await.unwrap_err();
        assert_eq!(err.current_context().kind(), ErrorKind::NotFound);
        assert!(harness.stack().await.is_empty());
    }

    #[tokio::test]
    async fn waiting_dialog_stays_on_stack_until_continued() {
        let mut harness = Harness::new();
        harness.add(EchoDialog::new("echo"));

        let (result, replies) = harness.begin("echo", Some(json!("ready"))).await.unwrap();
        assert!(result.is_waiting());
        assert_eq!(replies, vec!["ready".to_string()]);
        assert_eq!(harness.stack().await.depth(), 1);

        let (result, replies) = harness.send("ping").await.unwrap();
        assert_eq!(result, DialogTurnResult::complete(Some(json!("ping"))));
        assert_eq!(replies, vec!["echo: ping".to_string()]);
        assert!(harness.stack().await.is_empty());
    }

    #[tokio::test]
    async fn end_hooks_see_the_reason() {
        let mut harness = Harness::new();
        let (dialog, ends) = RecordingDialog::new("recorder");
        harness.add(dialog);

        harness.begin("recorder", None).await.unwrap();
        harness.cancel().await.unwrap();

        assert_eq!(*ends.lock().unwrap(), vec![DialogReason::CancelCalled]);
        assert!(harness.stack().await.is_empty());
    }

    #[tokio::test]
    async fn replace_keeps_depth_and_skips_parent() {
        let mut harness = Harness::new();
        let (recorder, ends) = RecordingDialog::new("recorder");
        harness.add(recorder);
        harness.add(ReplaceWith::new("swap", "echo"));
        harness.add(EchoDialog::new("echo"));

        harness.begin("recorder", None).await.unwrap();
        let mut turn = Harness::message("go");
        let mut dc = harness.set.create_context(&mut turn).await.unwrap();
        dc.begin_dialog("swap", None).await.unwrap();
        assert_eq!(dc.stack_depth(), 2);
        assert_eq!(dc.active_dialog_id(), Some("echo"));
        assert!(ends.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn replace_with_unknown_id_leaves_stack_alone() {
        let mut harness = Harness::new();
        harness.add(EchoDialog::new("echo"));
        harness.begin("echo", None).await.unwrap();

        let mut turn = Harness::message("go");
        let mut dc = harness.set.create_context(&mut turn).await.unwrap();
        let err = dc.replace_dialog("missing", None).await.unwrap_err();

        assert_eq!(err.current_context().kind(), ErrorKind::NotFound);
        assert_eq!(dc.active_dialog_id(), Some("echo"));
    }

    #[tokio::test]
    async fn mutual_replacement_hits_dispatch_cap() {
        let mut harness = Harness::with_settings(DialogSettings {
            max_dispatch_depth: 8,
        });
        harness.add(ReplaceWith::new("ping", "pong"));
        harness.add(ReplaceWith::new("pong", "ping"));

        let err = harness.begin("ping", None).await.unwrap_err();

        match err.current_context() {
            DialogError::InternalLoop { depth, .. } => assert_eq!(*depth, 9),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.current_context().kind().requires_stack_reset());
    }

    #[tokio::test]
    async fn unknown_persisted_frame_is_corrupt() {
        let mut harness = Harness::new();
        harness.add(EchoDialog::new("echo"));
        harness.begin("echo", None).await.unwrap();

        let mut renamed = Harness::new_sharing(&harness);
        renamed.add(EchoDialog::new("echo-v2"));
        let mut turn = Harness::message("hi");
        let err = renamed.set.create_context(&mut turn).await.unwrap_err();

        assert_eq!(err.current_context().kind(), ErrorKind::CorruptDialogState);
        assert_eq!(err.current_context().dialog_id(), Some("echo"));
    }

    #[tokio::test]
    async fn reprompt_on_empty_stack_is_noop() {
        let harness = Harness::new();
        let mut turn = Harness::message("hi");
        let mut dc = harness.set.create_context(&mut turn).await.unwrap();
        dc.reprompt_dialog().await.unwrap();
        assert!(!dc.turn().responded());
    }
}
