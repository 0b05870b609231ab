//! Error types for the bot crate.
//!
//! `TurnError` is the outermost error of a turn. Every variant wraps a lower
//! report via context and carries the conversation it happened in.

use colloquy_core::{ConversationRef, ErrorKind};
use colloquy_dialog::DialogError;
use colloquy_state::StateError;
use rootcause::Report;
use std::fmt;

/// Errors from processing a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnError {
    /// The dialog stack failed unrecoverably and was reset (use as context
    /// wrapper).
    DialogFailed {
        conversation_id: String,
        stack_depth: usize,
        dialog_id: Option<String>,
        cause: ErrorKind,
    },
    /// A dialog failed; the stack was left as persisted (use as context
    /// wrapper).
    Dialog {
        conversation_id: String,
        cause: ErrorKind,
    },
    /// Loading or saving state failed (use as context wrapper).
    StateFailed {
        conversation_id: String,
        cause: ErrorKind,
    },
    /// Concurrent turns kept overwriting this turn's state.
    Conflict {
        conversation_id: String,
        attempts: u32,
    },
}

impl TurnError {
    /// Returns the classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DialogFailed { cause, .. }
            | Self::Dialog { cause, .. }
            | Self::StateFailed { cause, .. } => *cause,
            Self::Conflict { .. } => ErrorKind::Conflict,
        }
    }

    /// Returns the conversation the turn belonged to.
    #[must_use]
    pub fn conversation_id(&self) -> &str {
        match self {
            Self::DialogFailed {
                conversation_id, ..
            }
            | Self::Dialog {
                conversation_id, ..
            }
            | Self::StateFailed {
                conversation_id, ..
            }
            | Self::Conflict {
                conversation_id, ..
            } => conversation_id,
        }
    }
}

impl fmt::Display for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DialogFailed {
                conversation_id,
                stack_depth,
                dialog_id,
                cause,
            } => {
                write!(
                    f,
                    "dialog stack of conversation {conversation_id} reset at depth {stack_depth} ({cause}"
                )?;
                if let Some(dialog_id) = dialog_id {
                    write!(f, " in dialog '{dialog_id}'")?;
                }
                write!(f, ")")
            }
            Self::Dialog {
                conversation_id,
                cause,
            } => write!(f, "dialog failed in conversation {conversation_id} ({cause})"),
            Self::StateFailed {
                conversation_id,
                cause,
            } => write!(f, "state failed in conversation {conversation_id} ({cause})"),
            Self::Conflict {
                conversation_id,
                attempts,
            } => write!(
                f,
                "conversation {conversation_id} kept conflicting after {attempts} attempts"
            ),
        }
    }
}

impl std::error::Error for TurnError {}

/// Wraps a dialog report for the turn, keeping its classification.
pub fn dialog_failure(report: Report<DialogError>, conversation: &ConversationRef) -> Report<TurnError> {
    let cause = report.current_context().kind();
    report.context(TurnError::Dialog {
        conversation_id: conversation.conversation_id.clone(),
        cause,
    })
}

/// Wraps a state report for the turn, keeping its classification.
pub fn state_failure(report: Report<StateError>, conversation: &ConversationRef) -> Report<TurnError> {
    let cause = report.current_context().kind();
    report.context(TurnError::StateFailed {
        conversation_id: conversation.conversation_id.clone(),
        cause,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrappers_keep_the_root_kind() {
        let conversation = ConversationRef::new("test", "c1");
        let report = Report::from(DialogError::InternalLoop {
            dialog_id: "ping".into(),
            depth: 65,
        });

        let wrapped = dialog_failure(report, &conversation);

        assert_eq!(wrapped.current_context().kind(), ErrorKind::InternalLoop);
        assert_eq!(wrapped.current_context().conversation_id(), "c1");
    }

    #[test]
    fn display_names_the_failing_dialog() {
        let err = TurnError::DialogFailed {
            conversation_id: "c1".into(),
            stack_depth: 2,
            dialog_id: Some("greet".into()),
            cause: ErrorKind::CorruptDialogState,
        };
        let text = err.to_string();
        assert!(text.contains("c1"), "{text}");
        assert!(text.contains("depth 2"), "{text}");
        assert!(text.contains("'greet'"), "{text}");
    }
}
