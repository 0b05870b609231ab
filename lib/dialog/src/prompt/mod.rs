//! Prompts: dialogs that ask for one typed value.
//!
//! A [`Prompt`] renders its prompt text, then on every message runs its
//! [`Recognizer`] and validator. An accepted answer ends the prompt with
//! the recognizer's result value; a rejected one re-renders the retry
//! text and waits again. Non-message activities leave the prompt waiting
//! untouched.

mod datetime;
mod machine;
mod options;
mod recognizer;
mod validator;

pub use datetime::{DateTimeResolution, IsoDateTimeRecognizer};
pub use machine::{PromptEffect, PromptEvent, PromptPhase, PromptState, PromptTransition, transition};
pub use options::{Choice, PromptOptions};
pub use recognizer::{
    DEFAULT_LOCALE, NumberRecognizer, PromptRecognizerResult, Recognizer, TextRecognizer,
};
pub use validator::{PromptValidator, PromptValidatorContext, Validation};

use crate::context::DialogContext;
use crate::dialog::{Dialog, DialogInstance, DialogReason, DialogTurnResult};
use crate::error::{DialogError, recognizer_failed};
use async_trait::async_trait;
use colloquy_core::{Result, TurnContext};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::debug;

const OPTIONS: &str = "options";
const TURN_COUNT: &str = "turnCount";

/// Prompts for free text.
pub type TextPrompt = Prompt<TextRecognizer>;
/// Prompts for a number.
pub type NumberPrompt = Prompt<NumberRecognizer>;
/// Prompts for a date or time.
pub type DateTimePrompt<R = IsoDateTimeRecognizer> = Prompt<R>;

/// A dialog that asks until a validator accepts an answer.
pub struct Prompt<R: Recognizer> {
    id: String,
    recognizer: R,
    validator: Option<PromptValidator<R::Candidate>>,
}

impl<R: Recognizer> Prompt<R> {
    #[must_use]
    pub fn new(id: impl Into<String>, recognizer: R) -> Self {
        Self {
            id: id.into(),
            recognizer,
            validator: None,
        }
    }

    /// Replaces the default validator, which accepts whatever was
    /// recognized.
    #[must_use]
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&PromptValidatorContext<'_, R::Candidate>) -> Validation<Vec<R::Candidate>>
            + Send
            + Sync
            + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    fn load_state(&self, instance: Option<&DialogInstance>) -> Result<PromptState, DialogError> {
        let corrupt = |reason: &str| DialogError::CorruptDialogState {
            dialog_id: self.id.clone(),
            reason: reason.to_string(),
        };
        let instance = instance.ok_or_else(|| corrupt("no active frame"))?;
        match (
            instance.get::<PromptOptions>(OPTIONS)?,
            instance.get::<u32>(TURN_COUNT)?,
        ) {
            (Some(options), Some(turn_count)) => Ok(PromptState {
                options,
                turn_count,
            }),
            _ => Err(corrupt("prompt state is missing").into()),
        }
    }

    async fn apply(
        &self,
        dc: &mut DialogContext<'_>,
        step: PromptTransition<Vec<R::Candidate>>,
    ) -> Result<DialogTurnResult, DialogError> {
        let mut accepted = None;
        for effect in step.effects {
            match effect {
                PromptEffect::Send(text) => {
                    dc.turn_mut().send_text(text);
                }
                PromptEffect::Persist => {
                    let instance =
                        dc.active_instance_mut()
                            .ok_or_else(|| DialogError::CorruptDialogState {
                                dialog_id: self.id.clone(),
                                reason: "no active frame".to_string(),
                            })?;
                    instance.set(OPTIONS, &step.state.options)?;
                    instance.set(TURN_COUNT, &step.state.turn_count)?;
                }
                PromptEffect::End(value) => accepted = Some(value),
            }
        }
        let Some(value) = accepted else {
            return Ok(DialogTurnResult::waiting());
        };
        let result =
            self.recognizer
                .result_value(value)
                .map_err(|e| DialogError::Serialization {
                    dialog_id: self.id.clone(),
                    reason: e.to_string(),
                })?;
        dc.end_dialog(Some(result)).await
    }
}

impl<R: Recognizer> std::fmt::Debug for Prompt<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prompt")
            .field("id", &self.id)
            .field("recognizer", &self.recognizer.name())
            .field("validated", &self.validator.is_some())
            .finish()
    }
}

#[async_trait]
impl<R: Recognizer + 'static> Dialog for Prompt<R> {
    fn id(&self) -> &str {
        &self.id
    }

    async fn begin_dialog(
        &self,
        dc: &mut DialogContext<'_>,
        options: Option<JsonValue>,
    ) -> Result<DialogTurnResult, DialogError> {
        let options = match options {
            Some(raw) => serde_json::from_value(raw).map_err(|e| DialogError::InvalidOptions {
                dialog_id: self.id.clone(),
                reason: e.to_string(),
            })?,
            None => PromptOptions::default(),
        };
        let step = transition(PromptState::new(options), PromptEvent::Begin);
        self.apply(dc, step).await
    }

    async fn continue_dialog(
        &self,
        dc: &mut DialogContext<'_>,
    ) -> Result<DialogTurnResult, DialogError> {
        let state = self.load_state(dc.active_instance())?;
        if !dc.turn().activity().is_message() {
            let step = transition(state, PromptEvent::Ignored);
            return self.apply(dc, step).await;
        }

        let activity = dc.turn().activity();
        let text = activity.text().to_string();
        let locale = activity
            .locale
            .clone()
            .unwrap_or_else(|| DEFAULT_LOCALE.to_string());
        let candidates = self
            .recognizer
            .recognize(&text, &locale)
            .await
            .map_err(|report| recognizer_failed(report, &self.id))?;
        let recognized = PromptRecognizerResult::from_candidates(candidates);

        let validation = {
            let context = PromptValidatorContext {
                recognized: &recognized,
                turn_count: state.turn_count,
                options: &state.options,
                activity: dc.turn().activity(),
            };
            match &self.validator {
                Some(validator) => validator(&context),
                None => context.accept_recognized(),
            }
        };
        debug!(
            dialog_id = %self.id,
            recognizer = self.recognizer.name(),
            turn_count = state.turn_count,
            recognized = recognized.succeeded,
            accepted = matches!(validation, Validation::Accept(_)),
            "prompt input validated"
        );

        let step = transition(state, PromptEvent::Input(validation));
        self.apply(dc, step).await
    }

    /// A dialog begun above the prompt has ended; ask again.
    async fn resume_dialog(
        &self,
        dc: &mut DialogContext<'_>,
        _reason: DialogReason,
        _result: Option<JsonValue>,
    ) -> Result<DialogTurnResult, DialogError> {
        dc.reprompt_dialog().await?;
        Ok(DialogTurnResult::waiting())
    }

    async fn reprompt_dialog(
        &self,
        turn: &mut TurnContext,
        instance: &DialogInstance,
    ) -> Result<(), DialogError> {
        let state = self.load_state(Some(instance))?;
        let step = transition::<Vec<R::Candidate>>(state, PromptEvent::Reprompt);
        for effect in step.effects {
            if let PromptEffect::Send(text) = effect {
                turn.send_text(text);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecognizerError;
    use crate::testing::Harness;
    use colloquy_core::ErrorKind;
    use serde_json::json;
    use std::sync::Mutex;

    fn number_prompt() -> NumberPrompt {
        NumberPrompt::new("count", NumberRecognizer)
    }

    fn asking(prompt: &str) -> Option<JsonValue> {
        Some(json!(PromptOptions::new(prompt)))
    }

    #[tokio::test]
    async fn accepted_answer_ends_with_result_value() {
        let mut harness = Harness::new();
        harness.add(number_prompt());

        let (result, replies) = harness.begin("count", asking("How many?")).await.unwrap();
        assert!(result.is_waiting());
        assert_eq!(replies, vec!["How many?"]);

        let (result, replies) = harness.send("a table for 4 please").await.unwrap();
        assert_eq!(result.result_as::<f64>().unwrap(), Some(4.0));
        assert!(replies.is_empty());
        assert!(harness.stack().await.is_empty());
    }

    #[tokio::test]
    async fn rejection_uses_retry_prompt_and_counts() {
        let mut harness = Harness::new();
        harness.add(number_prompt());
        let options = PromptOptions::new("How many?").with_retry_prompt("Digits, please.");
        harness.begin("count", Some(json!(options))).await.unwrap();

        for expected in 1..=3u32 {
            let (result, replies) = harness.send("lots").await.unwrap();
            assert!(result.is_waiting());
            assert_eq!(replies, vec!["Digits, please."]);
            let stack = harness.stack().await;
            assert_eq!(stack.depth(), 1);
            assert_eq!(stack.stack[0].state.get(TURN_COUNT), Some(&json!(expected)));
        }
    }

    #[tokio::test]
    async fn non_message_activity_is_ignored() {
        let mut harness = Harness::new();
        harness.add(number_prompt());
        harness.begin("count", asking("How many?")).await.unwrap();

        let (result, replies) = harness.deliver(Harness::event()).await.unwrap();
        assert!(result.is_waiting());
        assert!(replies.is_empty());
        assert_eq!(
            harness.stack().await.stack[0].state.get(TURN_COUNT),
            Some(&json!(0))
        );
    }

    #[tokio::test]
    async fn reprompt_renders_the_original_prompt() {
        let mut harness = Harness::new();
        harness.add(number_prompt());
        let options = PromptOptions::new("How many?").with_retry_prompt("Digits, please.");
        harness.begin("count", Some(json!(options))).await.unwrap();

        assert_eq!(harness.reprompt().await.unwrap(), vec!["How many?"]);
    }

    #[tokio::test]
    async fn validator_sees_rejection_count_and_can_rewrite() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&seen);
        let prompt = number_prompt().with_validator(move |context| {
            recorded.lock().unwrap().push(context.turn_count);
            match context.recognized.candidates() {
                [_, second, ..] => Validation::Accept(vec![*second * 10.0]),
                _ => Validation::Reject,
            }
        });
        let mut harness = Harness::new();
        harness.add(prompt);
        harness.begin("count", asking("Two numbers?")).await.unwrap();

        harness.send("just 1").await.unwrap();
        harness.send("none").await.unwrap();
        let (result, _) = harness.send("3 or 5").await.unwrap();

        assert_eq!(result.result_as::<f64>().unwrap(), Some(50.0));
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn text_prompt_returns_trimmed_text() {
        let mut harness = Harness::new();
        harness.add(TextPrompt::new("name", TextRecognizer));
        harness.begin("name", asking("Name?")).await.unwrap();

        let (result, _) = harness.send("   ").await.unwrap();
        assert!(result.is_waiting());
        let (result, _) = harness.send("  Ada Lovelace ").await.unwrap();
        assert_eq!(result.result, Some(json!("Ada Lovelace")));
    }

    #[tokio::test]
    async fn datetime_prompt_returns_every_resolution() {
        let mut harness = Harness::new();
        harness.add(DateTimePrompt::new("when", IsoDateTimeRecognizer));
        harness.begin("when", asking("When?")).await.unwrap();

        let (result, _) = harness.send("2018-12-05 09:00").await.unwrap();
        let resolutions: Vec<DateTimeResolution> = result.result_as().unwrap().unwrap();
        assert_eq!(
            resolutions,
            vec![DateTimeResolution::new("2018-12-05T09", "2018-12-05 09:00:00")]
        );
    }

    #[tokio::test]
    async fn malformed_options_are_rejected() {
        let mut harness = Harness::new();
        harness.add(number_prompt());

        let err = harness.begin("count", Some(json!(42))).await.unwrap_err();
        assert_eq!(err.current_context().kind(), ErrorKind::InvalidInput);
    }

    struct Unavailable;

    #[async_trait]
    impl Recognizer for Unavailable {
        type Candidate = String;

        fn name(&self) -> &str {
            "unavailable"
        }

        async fn recognize(&self, _text: &str, locale: &str) -> Result<Vec<String>, RecognizerError> {
            Err(RecognizerError::UnsupportedLocale {
                recognizer: "unavailable".into(),
                locale: locale.into(),
            }
            .into())
        }
    }

    #[tokio::test]
    async fn recognizer_failure_keeps_its_kind() {
        let mut harness = Harness::new();
        harness.add(Prompt::new("broken", Unavailable));
        harness.begin("broken", asking("Anything?")).await.unwrap();

        let err = harness.send("hello").await.unwrap_err();
        assert_eq!(err.current_context().kind(), ErrorKind::Recognizer);
        assert_eq!(err.current_context().dialog_id(), Some("broken"));
        assert_eq!(harness.stack().await.depth(), 1);
    }
}
