//! The prompt lifecycle as a pure state machine.
//!
//! A prompt is `Initial` until it begins, then alternates between
//! `WaitingForInput` and `Retrying` until a validator accepts an answer.
//! [`transition`] computes the next phase, the persisted counters and the
//! effects to perform; the dialog performs them.

use crate::prompt::options::PromptOptions;
use crate::prompt::validator::Validation;
use serde::{Deserialize, Serialize};

/// Phase of a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptPhase {
    Initial,
    WaitingForInput,
    Retrying,
    Ended,
}

/// What a prompt persists between turns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptState {
    pub options: PromptOptions,
    /// Number of rejected answers so far.
    pub turn_count: u32,
}

impl PromptState {
    #[must_use]
    pub fn new(options: PromptOptions) -> Self {
        Self {
            options,
            turn_count: 0,
        }
    }
}

/// Input to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptEvent<T> {
    /// The prompt was pushed.
    Begin,
    /// A message arrived and the validator ruled on it.
    Input(Validation<T>),
    /// A non-message activity arrived.
    Ignored,
    /// The prompt was asked to re-render.
    Reprompt,
}

/// Work the dialog performs after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptEffect<T> {
    /// Send this text to the user.
    Send(String),
    /// Write the new [`PromptState`] into the frame.
    Persist,
    /// Pop the prompt with this value.
    End(T),
}

/// Result of a transition.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTransition<T> {
    pub phase: PromptPhase,
    pub state: PromptState,
    pub effects: Vec<PromptEffect<T>>,
}

/// Computes the next state of a prompt.
#[must_use]
pub fn transition<T>(mut state: PromptState, event: PromptEvent<T>) -> PromptTransition<T> {
    let (phase, effects) = match event {
        PromptEvent::Begin => {
            state.turn_count = 0;
            let mut effects: Vec<_> = state
                .options
                .prompt
                .clone()
                .map(PromptEffect::Send)
                .into_iter()
                .collect();
            effects.push(PromptEffect::Persist);
            (PromptPhase::WaitingForInput, effects)
        }
        PromptEvent::Input(Validation::Accept(value)) => {
            (PromptPhase::Ended, vec![PromptEffect::End(value)])
        }
        PromptEvent::Input(Validation::Reject) => {
            state.turn_count = state.turn_count.saturating_add(1);
            let mut effects: Vec<_> = state
                .options
                .retry_text()
                .map(|text| PromptEffect::Send(text.to_string()))
                .into_iter()
                .collect();
            effects.push(PromptEffect::Persist);
            (PromptPhase::Retrying, effects)
        }
        PromptEvent::Ignored => (PromptPhase::WaitingForInput, Vec::new()),
        PromptEvent::Reprompt => {
            let effects = state
                .options
                .prompt
                .clone()
                .map(PromptEffect::Send)
                .into_iter()
                .collect();
            (PromptPhase::WaitingForInput, effects)
        }
    };
    PromptTransition {
        phase,
        state,
        effects,
    }
}
