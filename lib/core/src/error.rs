//! Error handling foundation for the colloquy engine.
//!
//! This module provides the `Result` type alias using rootcause and the
//! [`ErrorKind`] classification shared by every crate. Each crate defines
//! its own domain-specific error enum in its own error module and reports
//! an `ErrorKind` for it, so callers at the turn boundary can decide
//! between retrying, resetting the dialog stack, or surfacing the failure.

use rootcause::Report;
use std::fmt;

/// A Result type alias using rootcause's Report for error handling.
///
/// Each layer adds its own context via `.context()` as errors propagate.
pub type Result<T, C> = std::result::Result<T, Report<C>>;

/// Classification of a failure, independent of the layer that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A dialog id is not registered.
    NotFound,
    /// A dialog id was registered twice.
    DuplicateId,
    /// Optimistic-concurrency loss while saving state.
    Conflict,
    /// The persisted stack disagrees with the current dialog definitions.
    CorruptDialogState,
    /// Dialog propagation exceeded the dispatch depth bound.
    InternalLoop,
    /// Options or state payloads could not be (de)serialized.
    InvalidInput,
    /// A recognizer backend failed.
    Recognizer,
    /// A storage backend failed for reasons other than a version conflict.
    Storage,
}

impl ErrorKind {
    /// Returns true if the failed operation can be retried after reloading state.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict)
    }

    /// Returns true if the conversation's dialog stack must be cleared.
    #[must_use]
    pub fn requires_stack_reset(&self) -> bool {
        matches!(self, Self::CorruptDialogState | Self::InternalLoop)
    }

    /// Returns true for configuration errors surfaced at setup time.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::NotFound | Self::DuplicateId)
    }

    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::DuplicateId => "duplicate_id",
            Self::Conflict => "conflict",
            Self::CorruptDialogState => "corrupt_dialog_state",
            Self::InternalLoop => "internal_loop",
            Self::InvalidInput => "invalid_input",
            Self::Recognizer => "recognizer",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
