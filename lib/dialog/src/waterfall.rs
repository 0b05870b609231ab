//! Waterfall dialogs.
//!
//! A waterfall runs an ordered list of async steps. Each step decides how
//! the waterfall proceeds through its [`StepOutcome`]: advance to the next
//! step within the same turn, wait for the user, end, or hand control to a
//! child dialog it just began. The index of the running step is persisted
//! in the frame so the waterfall picks up at the following step when the
//! next turn arrives or the child ends.

use crate::context::DialogContext;
use crate::dialog::{Dialog, DialogInstance, DialogReason, DialogTurnResult};
use crate::error::DialogError;
use async_trait::async_trait;
use colloquy_core::Result;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

const OPTIONS: &str = "options";
const VALUES: &str = "values";
const STEP_INDEX: &str = "stepIndex";

/// What a waterfall does after a step returns.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Run the next step now, passing it this value as its result.
    Next(Option<JsonValue>),
    /// Wait for the next turn; its text becomes the next step's result.
    Wait,
    /// End the waterfall with this value.
    End(Option<JsonValue>),
    /// The step began a child dialog; pass its turn result through.
    ///
    /// When the child ends, its result becomes the next step's result.
    Dialog(DialogTurnResult),
}

/// Future returned by a waterfall step.
pub type StepFuture<'a> = BoxFuture<'a, Result<StepOutcome, DialogError>>;

type Step = Box<
    dyn for<'a, 'b> Fn(&'a mut DialogContext<'b>, WaterfallStepContext) -> StepFuture<'a>
        + Send
        + Sync,
>;

/// What a step knows about the waterfall invocation it runs in.
#[derive(Debug, Clone)]
pub struct WaterfallStepContext {
    /// Zero-based index of the running step.
    pub index: usize,
    /// Options the waterfall was begun with.
    pub options: Option<JsonValue>,
    /// The previous step's value, the user's reply, or a child's result.
    pub result: Option<JsonValue>,
    /// Why this step is running.
    pub reason: DialogReason,
    /// Values stored by earlier steps of this invocation.
    pub values: Map<String, JsonValue>,
    dialog_id: String,
    frame: usize,
}

impl WaterfallStepContext {
    /// Decodes the step's input value.
    ///
    /// # Errors
    ///
    /// Returns [`DialogError::Serialization`] if the value has another shape.
    pub fn result_as<T: DeserializeOwned>(&self) -> Result<Option<T>, DialogError> {
        self.decode(self.result.clone())
    }

    /// Decodes a value stored by an earlier step.
    ///
    /// # Errors
    ///
    /// Returns [`DialogError::Serialization`] if the value has another shape.
    pub fn value<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DialogError> {
        self.decode(self.values.get(key).cloned())
    }

    /// Stores a value for later steps of this invocation.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized or the waterfall's
    /// frame is gone.
    pub fn set_value<T: Serialize + ?Sized>(
        &mut self,
        dc: &mut DialogContext<'_>,
        key: &str,
        value: &T,
    ) -> Result<(), DialogError> {
        let raw = serde_json::to_value(value).map_err(|e| DialogError::Serialization {
            dialog_id: self.dialog_id.clone(),
            reason: e.to_string(),
        })?;
        self.values.insert(key.to_string(), raw);
        own_frame(dc, self.frame, &self.dialog_id)?.set(VALUES, &self.values)
    }

    fn decode<T: DeserializeOwned>(&self, raw: Option<JsonValue>) -> Result<Option<T>, DialogError> {
        raw.map(serde_json::from_value)
            .transpose()
            .map_err(|e| {
                DialogError::Serialization {
                    dialog_id: self.dialog_id.clone(),
                    reason: e.to_string(),
                }
                .into()
            })
    }
}

/// Returns the frame at `frame` if it still belongs to `dialog_id`.
///
/// Children that end within the same turn can pop the waterfall, after
/// which its index may hold another dialog's frame.
fn own_frame<'a>(
    dc: &'a mut DialogContext<'_>,
    frame: usize,
    dialog_id: &str,
) -> Result<&'a mut DialogInstance, DialogError> {
    dc.instance_mut(frame)
        .filter(|instance| instance.id == dialog_id)
        .ok_or_else(|| {
            DialogError::CorruptDialogState {
                dialog_id: dialog_id.to_string(),
                reason: format!("waterfall frame {frame} is no longer on the stack"),
            }
            .into()
        })
}

/// A dialog made of ordered steps.
pub struct WaterfallDialog {
    id: String,
    steps: Vec<Step>,
}

impl WaterfallDialog {
    /// Creates a waterfall with no steps.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            steps: Vec::new(),
        }
    }

    /// Appends a step.
    #[must_use]
    pub fn add_step<F>(mut self, step: F) -> Self
    where
        F: for<'a, 'b> Fn(&'a mut DialogContext<'b>, WaterfallStepContext) -> StepFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        self.steps.push(Box::new(step));
        self
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    fn stored_index(&self, instance: Option<&DialogInstance>) -> Result<usize, DialogError> {
        let corrupt = |reason: String| DialogError::CorruptDialogState {
            dialog_id: self.id.clone(),
            reason,
        };
        let instance = instance.ok_or_else(|| corrupt("no active frame".to_string()))?;
        match instance.get::<usize>(STEP_INDEX)? {
            Some(index) if index < self.steps.len() => Ok(index),
            Some(index) => Err(corrupt(format!(
                "step index {index} is out of range for {} steps",
                self.steps.len()
            ))
            .into()),
            None => Err(corrupt("step index is missing".to_string()).into()),
        }
    }

    async fn run_steps(
        &self,
        dc: &mut DialogContext<'_>,
        mut index: usize,
        mut reason: DialogReason,
        mut result: Option<JsonValue>,
    ) -> Result<DialogTurnResult, DialogError> {
        let frame = dc.stack_depth().saturating_sub(1);
        loop {
            let Some(step) = self.steps.get(index) else {
                debug!(dialog_id = %self.id, "waterfall finished");
                return dc.end_dialog(result).await;
            };

            let instance = own_frame(dc, frame, &self.id)?;
            instance.set(STEP_INDEX, &index)?;
            let options = instance.get::<JsonValue>(OPTIONS)?;
            let values = instance.get::<Map<String, JsonValue>>(VALUES)?.unwrap_or_default();

            let context = WaterfallStepContext {
                index,
                options,
                result: result.take(),
                reason,
                values,
                dialog_id: self.id.clone(),
                frame,
            };
            debug!(dialog_id = %self.id, step = index, ?reason, "running waterfall step");
            match step(dc, context).await? {
                StepOutcome::Next(value) => {
                    index += 1;
                    reason = DialogReason::NextCalled;
                    result = value;
                }
                StepOutcome::Wait => return Ok(DialogTurnResult::waiting()),
                StepOutcome::End(value) => return dc.end_dialog(value).await,
                StepOutcome::Dialog(outcome) => return Ok(outcome),
            }
        }
    }
}

impl std::fmt::Debug for WaterfallDialog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaterfallDialog")
            .field("id", &self.id)
            .field("steps", &self.steps.len())
            .finish()
    }
}

#[async_trait]
impl Dialog for WaterfallDialog {
    fn id(&self) -> &str {
        &self.id
    }

    async fn begin_dialog(
        &self,
        dc: &mut DialogContext<'_>,
        options: Option<JsonValue>,
    ) -> Result<DialogTurnResult, DialogError> {
        let instance = dc
            .active_instance_mut()
            .ok_or_else(|| DialogError::CorruptDialogState {
                dialog_id: self.id.clone(),
                reason: "no active frame".to_string(),
            })?;
        if let Some(options) = &options {
            instance.set(OPTIONS, options)?;
        }
        instance.set(VALUES, &Map::new())?;
        self.run_steps(dc, 0, DialogReason::BeginCalled, options).await
    }

    async fn continue_dialog(
        &self,
        dc: &mut DialogContext<'_>,
    ) -> Result<DialogTurnResult, DialogError> {
        if !dc.turn().activity().is_message() {
            return Ok(DialogTurnResult::waiting());
        }
        let index = self.stored_index(dc.active_instance())?;
        let text = dc.turn().activity().text().to_string();
        self.run_steps(
            dc,
            index + 1,
            DialogReason::ContinueCalled,
            Some(JsonValue::String(text)),
        )
        .await
    }

    async fn resume_dialog(
        &self,
        dc: &mut DialogContext<'_>,
        reason: DialogReason,
        result: Option<JsonValue>,
    ) -> Result<DialogTurnResult, DialogError> {
        let index = self.stored_index(dc.active_instance())?;
        self.run_steps(dc, index + 1, reason, result).await
    }
}
