//! Dialog registry.

use crate::context::DialogContext;
use crate::dialog::Dialog;
use crate::error::{DialogError, state_access};
use crate::settings::DialogSettings;
use crate::stack::DialogState;
use colloquy_core::{Result, TurnContext};
use colloquy_state::{StateError, StatePropertyAccessor};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// A registry of dialog definitions keyed by id.
///
/// A set holds no per-conversation state and is shared read-only by every
/// conversation. The root set of a bot is created with the conversation
/// property its stack is persisted in; sets nested in container dialogs are
/// created without one.
#[derive(Default)]
pub struct DialogSet {
    dialogs: HashMap<String, Arc<dyn Dialog>>,
    dialog_state: Option<StatePropertyAccessor<DialogState>>,
    settings: DialogSettings,
}

impl DialogSet {
    /// Creates a set without a state property, for use inside a container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a root set that loads and persists its stack through `dialog_state`.
    #[must_use]
    pub fn with_state(dialog_state: StatePropertyAccessor<DialogState>) -> Self {
        Self {
            dialog_state: Some(dialog_state),
            ..Self::default()
        }
    }

    /// Sets the execution settings.
    #[must_use]
    pub fn with_settings(mut self, settings: DialogSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Registers a dialog.
    ///
    /// # Errors
    ///
    /// Returns [`DialogError::DuplicateId`] if the id is already taken.
    pub fn add(&mut self, dialog: impl Dialog + 'static) -> Result<(), DialogError> {
        self.add_shared(Arc::new(dialog))
    }

    /// Registers a dialog that is shared with other sets.
    ///
    /// # Errors
    ///
    /// Returns [`DialogError::DuplicateId`] if the id is already taken.
    pub fn add_shared(&mut self, dialog: Arc<dyn Dialog>) -> Result<(), DialogError> {
        let id = dialog.id().to_string();
        if self.dialogs.contains_key(&id) {
            return Err(DialogError::DuplicateId { dialog_id: id }.into());
        }
        debug!(dialog_id = %id, "registered dialog");
        self.dialogs.insert(id, dialog);
        Ok(())
    }

    /// Looks up a dialog by id.
    #[must_use]
    pub fn find(&self, dialog_id: &str) -> Option<Arc<dyn Dialog>> {
        self.dialogs.get(dialog_id).cloned()
    }

    /// Returns whether a dialog is registered under `dialog_id`.
    #[must_use]
    pub fn contains(&self, dialog_id: &str) -> bool {
        self.dialogs.contains_key(dialog_id)
    }

    /// Returns the registered ids.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.dialogs.keys().map(String::as_str)
    }

    /// Returns the number of registered dialogs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dialogs.len()
    }

    /// Returns whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dialogs.is_empty()
    }

    /// Returns the execution settings.
    #[must_use]
    pub fn settings(&self) -> &DialogSettings {
        &self.settings
    }

    /// Returns the property the stack is persisted in.
    #[must_use]
    pub fn state_accessor(&self) -> Option<&StatePropertyAccessor<DialogState>> {
        self.dialog_state.as_ref()
    }

    /// Loads the conversation's stack and binds it to the turn.
    ///
    /// # Errors
    ///
    /// Returns an error if the set has no state property, the state cannot
    /// be loaded, or a persisted frame no longer resolves to a registered
    /// dialog.
    #[instrument(skip(self, turn), fields(conversation = %turn.conversation()))]
    pub async fn create_context<'t>(
        &'t self,
        turn: &'t mut TurnContext,
    ) -> Result<DialogContext<'t>, DialogError> {
        let accessor = self.dialog_state.as_ref().ok_or(DialogError::NoStateAccessor)?;
        let state = accessor
            .get(turn, DialogState::default)
            .await
            .map_err(|report| match report.current_context() {
                StateError::Serialization { reason, .. } => {
                    let reason = format!("stack is unreadable: {reason}");
                    report.context(DialogError::CorruptDialogState {
                        dialog_id: accessor.name().to_string(),
                        reason,
                    })
                }
                _ => state_access(report, accessor.name()),
            })?;
        DialogContext::new(self, turn, state)
    }

    /// Replaces the conversation's stack with an empty one.
    ///
    /// The change is staged in the turn's state cache and persisted when
    /// conversation state is saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the set has no state property or staging fails.
    pub async fn clear_state(&self, turn: &mut TurnContext) -> Result<(), DialogError> {
        let accessor = self.dialog_state.as_ref().ok_or(DialogError::NoStateAccessor)?;
        accessor
            .set(turn, &DialogState::default())
            .await
            .map_err(|report| state_access(report, accessor.name()))
    }
}

impl std::fmt::Debug for DialogSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&str> = self.ids().collect();
        ids.sort_unstable();
        f.debug_struct("DialogSet")
            .field("dialogs", &ids)
            .field("dialog_state", &self.dialog_state)
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EchoDialog, Harness};
    use colloquy_core::ErrorKind;

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut set = DialogSet::new();
        set.add(EchoDialog::new("echo")).unwrap();

        let err = set.add(EchoDialog::new("echo")).unwrap_err();

        assert_eq!(err.current_context().kind(), ErrorKind::DuplicateId);
        assert_eq!(set.len(), 1);
        assert!(set.contains("echo"));
        assert!(set.find("other").is_none());
    }

    #[tokio::test]
    async fn inner_set_cannot_create_context() {
        let set = DialogSet::new();
        let mut turn = Harness::message("hi");

        let err = set.create_context(&mut turn).await.unwrap_err();

        assert_eq!(err.current_context(), &DialogError::NoStateAccessor);
    }

    #[tokio::test]
    async fn clear_state_empties_stack() {
        let mut harness = Harness::new();
        harness.add(EchoDialog::new("echo"));
        harness.begin("echo", None).await.unwrap();
        assert_eq!(harness.stack().await.depth(), 1);

        let mut turn = Harness::message("reset");
        harness.set.clear_state(&mut turn).await.unwrap();
        harness.state.save_changes(&mut turn, false).await.unwrap();

        assert!(harness.stack().await.is_empty());
    }

    #[tokio::test]
    async fn unreadable_stack_is_corrupt() {
        let harness = Harness::new();
        let mut turn = Harness::message("hi");
        harness
            .state
            .property_accessor::<serde_json::Value>(crate::stack::DIALOG_STATE_PROPERTY)
            .set(&mut turn, &serde_json::json!({"stack": "not a list"}))
            .await
            .unwrap();

        let err = harness.set.create_context(&mut turn).await.unwrap_err();

        assert_eq!(err.current_context().kind(), ErrorKind::CorruptDialogState);
    }
}
