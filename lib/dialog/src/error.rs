//! Error types for the dialog engine.
//!
//! Errors are designed for layered context using rootcause:
//! - `RecognizerError`: Failures of a pluggable recognizer backend
//! - `DialogError`: Failures of stack operations, dialog definitions and
//!   prompt processing (wraps recognizer and state reports via context)

use colloquy_core::ErrorKind;
use colloquy_state::StateError;
use rootcause::Report;
use std::fmt;

/// Errors from recognizer backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerError {
    /// The backend could not process the input.
    Failed { recognizer: String, reason: String },
    /// The backend does not support the requested locale.
    UnsupportedLocale { recognizer: String, locale: String },
}

impl RecognizerError {
    /// Returns the classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Recognizer
    }
}

impl fmt::Display for RecognizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { recognizer, reason } => {
                write!(f, "recognizer '{recognizer}' failed: {reason}")
            }
            Self::UnsupportedLocale { recognizer, locale } => {
                write!(f, "recognizer '{recognizer}' does not support locale '{locale}'")
            }
        }
    }
}

impl std::error::Error for RecognizerError {}

/// Errors from the dialog engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogError {
    /// A dialog id is not registered in any reachable dialog set.
    NotFound { dialog_id: String },
    /// A dialog id was registered twice in one set.
    DuplicateId { dialog_id: String },
    /// The persisted stack disagrees with the registered dialogs.
    CorruptDialogState { dialog_id: String, reason: String },
    /// Nested dispatches exceeded the configured bound.
    InternalLoop { dialog_id: String, depth: usize },
    /// Begin options could not be decoded.
    InvalidOptions { dialog_id: String, reason: String },
    /// A value could not be (de)serialized into dialog state or a result.
    Serialization { dialog_id: String, reason: String },
    /// The dialog set has no state property to load the stack from.
    NoStateAccessor,
    /// A recognizer failed (use as context wrapper).
    RecognizerFailed { dialog_id: String, cause: ErrorKind },
    /// Loading or staging the dialog state failed (use as context wrapper).
    StateAccess { property: String, cause: ErrorKind },
}

impl DialogError {
    /// Returns the classification of this error.
    ///
    /// Context wrappers report the kind of the failure they wrap.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::DuplicateId { .. } => ErrorKind::DuplicateId,
            Self::CorruptDialogState { .. } => ErrorKind::CorruptDialogState,
            Self::InternalLoop { .. } => ErrorKind::InternalLoop,
            Self::InvalidOptions { .. } | Self::Serialization { .. } | Self::NoStateAccessor => {
                ErrorKind::InvalidInput
            }
            Self::RecognizerFailed { cause, .. } | Self::StateAccess { cause, .. } => *cause,
        }
    }

    /// Returns the dialog the error is attributed to, if any.
    #[must_use]
    pub fn dialog_id(&self) -> Option<&str> {
        match self {
            Self::NotFound { dialog_id }
            | Self::DuplicateId { dialog_id }
            | Self::CorruptDialogState { dialog_id, .. }
            | Self::InternalLoop { dialog_id, .. }
            | Self::InvalidOptions { dialog_id, .. }
            | Self::Serialization { dialog_id, .. }
            | Self::RecognizerFailed { dialog_id, .. } => Some(dialog_id),
            Self::NoStateAccessor | Self::StateAccess { .. } => None,
        }
    }
}

impl fmt::Display for DialogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { dialog_id } => write!(f, "dialog '{dialog_id}' is not registered"),
            Self::DuplicateId { dialog_id } => {
                write!(f, "dialog '{dialog_id}' is already registered")
            }
            Self::CorruptDialogState { dialog_id, reason } => {
                write!(f, "persisted state for dialog '{dialog_id}' is inconsistent: {reason}")
            }
            Self::InternalLoop { dialog_id, depth } => write!(
                f,
                "dispatch depth {depth} exceeded while entering dialog '{dialog_id}'"
            ),
            Self::InvalidOptions { dialog_id, reason } => {
                write!(f, "invalid options for dialog '{dialog_id}': {reason}")
            }
            Self::Serialization { dialog_id, reason } => {
                write!(f, "dialog '{dialog_id}' could not serialize a value: {reason}")
            }
            Self::NoStateAccessor => write!(f, "dialog set has no dialog state property"),
            Self::RecognizerFailed { dialog_id, cause } => {
                write!(f, "recognizer for dialog '{dialog_id}' failed ({cause})")
            }
            Self::StateAccess { property, cause } => {
                write!(f, "state property '{property}' could not be accessed ({cause})")
            }
        }
    }
}

impl std::error::Error for DialogError {}

/// Wraps a state report for the dialog layer, keeping its classification.
pub(crate) fn state_access(report: Report<StateError>, property: &str) -> Report<DialogError> {
    let cause = report.current_context().kind();
    report.context(DialogError::StateAccess {
        property: property.to_string(),
        cause,
    })
}

/// Wraps a recognizer report for the dialog layer, keeping its classification.
pub(crate) fn recognizer_failed(
    report: Report<RecognizerError>,
    dialog_id: &str,
) -> Report<DialogError> {
    let cause = report.current_context().kind();
    report.context(DialogError::RecognizerFailed {
        dialog_id: dialog_id.to_string(),
        cause,
    })
}
