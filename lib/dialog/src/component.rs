//! Component dialogs.
//!
//! A component packages a private [`DialogSet`] behind a single dialog id.
//! Beginning the component begins its initial dialog; the component ends
//! with the result of that dialog. Children are pushed as ordinary frames
//! above the component's frame, and ids they begin resolve in the
//! component's set before the enclosing sets.

use crate::context::DialogContext;
use crate::dialog::{Dialog, DialogTurnResult};
use crate::error::DialogError;
use crate::set::DialogSet;
use async_trait::async_trait;
use colloquy_core::Result;
use serde_json::Value as JsonValue;

/// A dialog composed of other dialogs.
#[derive(Debug)]
pub struct ComponentDialog {
    id: String,
    initial_dialog_id: Option<String>,
    dialogs: DialogSet,
}

impl ComponentDialog {
    /// Creates an empty component.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            initial_dialog_id: None,
            dialogs: DialogSet::new(),
        }
    }

    /// Sets the dialog begun when the component begins.
    ///
    /// Defaults to the first dialog added.
    #[must_use]
    pub fn with_initial_dialog(mut self, dialog_id: impl Into<String>) -> Self {
        self.initial_dialog_id = Some(dialog_id.into());
        self
    }

    /// Adds a dialog to the component's private set.
    ///
    /// # Errors
    ///
    /// Returns [`DialogError::DuplicateId`] if the id is already taken.
    pub fn add_dialog(&mut self, dialog: impl Dialog + 'static) -> Result<(), DialogError> {
        let id = dialog.id().to_string();
        self.dialogs.add(dialog)?;
        if self.initial_dialog_id.is_none() {
            self.initial_dialog_id = Some(id);
        }
        Ok(())
    }

    /// Returns the id of the initial dialog.
    #[must_use]
    pub fn initial_dialog_id(&self) -> Option<&str> {
        self.initial_dialog_id.as_deref()
    }
}

#[async_trait]
impl Dialog for ComponentDialog {
    fn id(&self) -> &str {
        &self.id
    }

    async fn begin_dialog(
        &self,
        dc: &mut DialogContext<'_>,
        options: Option<JsonValue>,
    ) -> Result<DialogTurnResult, DialogError> {
        let initial = self
            .initial_dialog_id
            .as_deref()
            .ok_or_else(|| DialogError::NotFound {
                dialog_id: format!("{}/<initial>", self.id),
            })?;
        dc.begin_dialog(initial, options).await
    }

    fn dialogs(&self) -> Option<&DialogSet> {
        Some(&self.dialogs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::DialogReason;
    use crate::testing::{EchoDialog, Harness, RecordingDialog};
    use crate::waterfall::{StepOutcome, WaterfallDialog};
    use colloquy_core::ErrorKind;
    use serde_json::json;

    fn profile_component() -> ComponentDialog {
        let mut component = ComponentDialog::new("profile");
        component
            .add_dialog(
                WaterfallDialog::new("profile.steps")
                    .add_step(|dc, _step| {
                        Box::pin(async move {
                            let outcome = dc.begin_dialog("ask", Some(json!("Name?"))).await?;
                            Ok(StepOutcome::Dialog(outcome))
                        })
                    })
                    .add_step(|_dc, step| {
                        Box::pin(async move {
                            Ok(StepOutcome::End(Some(json!({"name": step.result}))))
                        })
                    }),
            )
            .unwrap();
        component.add_dialog(EchoDialog::new("ask")).unwrap();
        component
    }

    #[tokio::test]
    async fn component_ends_with_inner_result() {
        let mut harness = Harness::new();
        harness.add(profile_component());

        let (result, replies) = harness.begin("profile", None).await.unwrap();
        assert!(result.is_waiting());
        assert_eq!(replies, vec!["Name?"]);

        let stack = harness.stack().await;
        let ids: Vec<&str> = stack.stack.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["profile", "profile.steps", "ask"]);

        let (result, _) = harness.send("Ada").await.unwrap();
        assert_eq!(result.result, Some(json!({"name": "Ada"})));
        assert!(harness.stack().await.is_empty());
    }

    #[tokio::test]
    async fn inner_ids_are_private_to_the_component() {
        let mut harness = Harness::new();
        harness.add(profile_component());

        let err = harness.begin("ask", None).await.unwrap_err();
        assert_eq!(err.current_context().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn inner_frames_fall_back_to_outer_set() {
        let mut component = ComponentDialog::new("outer-ref");
        component
            .add_dialog(WaterfallDialog::new("steps").add_step(|dc, _step| {
                Box::pin(async move {
                    let outcome = dc.begin_dialog("shared", None).await?;
                    Ok(StepOutcome::Dialog(outcome))
                })
            }))
            .unwrap();
        let (shared, ends) = RecordingDialog::new("shared");
        let mut harness = Harness::new();
        harness.add(component);
        harness.add(shared);

        harness.begin("outer-ref", None).await.unwrap();
        assert_eq!(harness.stack().await.depth(), 3);

        harness.cancel().await.unwrap();
        assert_eq!(*ends.lock().unwrap(), vec![DialogReason::CancelCalled]);
    }

    #[tokio::test]
    async fn empty_component_cannot_begin() {
        let mut harness = Harness::new();
        harness.add(ComponentDialog::new("empty"));

        let err = harness.begin("empty", None).await.unwrap_err();
        assert_eq!(err.current_context().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn first_added_dialog_is_initial() {
        let component = profile_component();
        assert_eq!(component.initial_dialog_id(), Some("profile.steps"));
        let component = profile_component().with_initial_dialog("ask");
        assert_eq!(component.initial_dialog_id(), Some("ask"));
    }
}
