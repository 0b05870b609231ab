//! Prompt validators.
//!
//! A validator is a pure function of what was recognized this turn. It
//! accepts by returning the value the prompt should end with, which may
//! differ from what was recognized, or rejects and lets the prompt retry.

use crate::prompt::options::PromptOptions;
use crate::prompt::recognizer::PromptRecognizerResult;
use colloquy_core::Activity;
use std::sync::Arc;

/// A validator's verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation<T> {
    /// End the prompt with this value.
    Accept(T),
    /// Re-prompt and wait for another answer.
    Reject,
}

/// What a validator sees.
#[derive(Debug)]
pub struct PromptValidatorContext<'a, T> {
    /// This turn's candidates, most confident first.
    pub recognized: &'a PromptRecognizerResult<Vec<T>>,
    /// Number of answers rejected before this one.
    pub turn_count: u32,
    /// The options the prompt began with.
    pub options: &'a PromptOptions,
    /// The inbound activity.
    pub activity: &'a Activity,
}

impl<T: Clone> PromptValidatorContext<'_, T> {
    /// Accepts every candidate if recognition succeeded, otherwise rejects.
    #[must_use]
    pub fn accept_recognized(&self) -> Validation<Vec<T>> {
        match (&self.recognized.value, self.recognized.succeeded) {
            (Some(candidates), true) => Validation::Accept(candidates.clone()),
            _ => Validation::Reject,
        }
    }
}

/// A shared validator over candidates of type `T`.
pub type PromptValidator<T> =
    Arc<dyn Fn(&PromptValidatorContext<'_, T>) -> Validation<Vec<T>> + Send + Sync>;
