//! The persisted dialog stack.

use crate::dialog::DialogInstance;
use serde::{Deserialize, Serialize};

/// Name of the conversation-state property the stack is stored under.
pub const DIALOG_STATE_PROPERTY: &str = "dialogState";

/// The ordered frames of one conversation. Index 0 is the root frame; the
/// last frame is the active one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogState {
    #[serde(default)]
    pub stack: Vec<DialogInstance>,
}

impl DialogState {
    /// Returns true if no dialog is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Returns the number of frames.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Returns the active frame.
    #[must_use]
    pub fn active(&self) -> Option<&DialogInstance> {
        self.stack.last()
    }
}
