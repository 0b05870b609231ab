//! The dialog engine for colloquy.
//!
//! This crate provides:
//!
//! - **Dialog contract**: the [`Dialog`] trait and the per-frame [`DialogInstance`]
//! - **Stack execution**: [`DialogContext`] begins, continues, ends and replaces frames
//! - **Registries**: [`DialogSet`] resolves dialog ids and loads the persisted stack
//! - **Composition**: [`WaterfallDialog`] step sequences and [`ComponentDialog`] scopes
//! - **Prompts**: [`Prompt`] with pluggable recognizers and validators

pub mod component;
pub mod context;
pub mod dialog;
pub mod error;
pub mod prompt;
pub mod set;
pub mod settings;
pub mod stack;
pub mod waterfall;

#[cfg(test)]
mod testing;

pub use component::ComponentDialog;
pub use context::DialogContext;
pub use dialog::{Dialog, DialogInstance, DialogReason, DialogTurnResult, DialogTurnStatus};
pub use error::{DialogError, RecognizerError};
pub use prompt::{
    Choice, DateTimePrompt, DateTimeResolution, IsoDateTimeRecognizer, NumberPrompt,
    NumberRecognizer, Prompt, PromptOptions, PromptRecognizerResult, PromptValidator,
    PromptValidatorContext, Recognizer, TextPrompt, TextRecognizer, Validation,
};
pub use set::DialogSet;
pub use settings::DialogSettings;
pub use stack::{DIALOG_STATE_PROPERTY, DialogState};
pub use waterfall::{StepFuture, StepOutcome, WaterfallDialog, WaterfallStepContext};
