//! The recognizer contract and the bundled text and number recognizers.

use crate::error::RecognizerError;
use async_trait::async_trait;
use colloquy_core::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Locale used when the inbound activity carries none.
pub const DEFAULT_LOCALE: &str = "en-us";

/// Turns raw user input into ranked typed candidates.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// The typed value a candidate carries.
    type Candidate: Serialize + Clone + Send + Sync + 'static;

    /// Returns the recognizer's name, used in logs and errors.
    fn name(&self) -> &str;

    /// Recognizes `text`, most confident candidate first. An empty list
    /// means nothing was recognized.
    async fn recognize(
        &self,
        text: &str,
        locale: &str,
    ) -> Result<Vec<Self::Candidate>, RecognizerError>;

    /// Builds the prompt's result from the accepted candidates.
    ///
    /// The default is the whole ordered list.
    fn result_value(&self, accepted: Vec<Self::Candidate>) -> serde_json::Result<JsonValue> {
        serde_json::to_value(accepted)
    }
}

/// Recognition outcome for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRecognizerResult<T> {
    pub succeeded: bool,
    pub value: Option<T>,
}

impl<C> PromptRecognizerResult<Vec<C>> {
    /// Wraps a candidate list; an empty list did not succeed.
    #[must_use]
    pub fn from_candidates(candidates: Vec<C>) -> Self {
        if candidates.is_empty() {
            Self {
                succeeded: false,
                value: None,
            }
        } else {
            Self {
                succeeded: true,
                value: Some(candidates),
            }
        }
    }

    /// Returns the candidates, most confident first.
    #[must_use]
    pub fn candidates(&self) -> &[C] {
        self.value.as_deref().unwrap_or_default()
    }
}

/// Recognizes any non-blank text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRecognizer;

#[async_trait]
impl Recognizer for TextRecognizer {
    type Candidate = String;

    fn name(&self) -> &str {
        "text"
    }

    async fn recognize(&self, text: &str, _locale: &str) -> Result<Vec<String>, RecognizerError> {
        let text = text.trim();
        Ok(if text.is_empty() {
            Vec::new()
        } else {
            vec![text.to_string()]
        })
    }

    fn result_value(&self, accepted: Vec<String>) -> serde_json::Result<JsonValue> {
        serde_json::to_value(accepted.into_iter().next())
    }
}

/// Recognizes every decimal number in the text, in order of appearance.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberRecognizer;

#[async_trait]
impl Recognizer for NumberRecognizer {
    type Candidate = f64;

    fn name(&self) -> &str {
        "number"
    }

    async fn recognize(&self, text: &str, _locale: &str) -> Result<Vec<f64>, RecognizerError> {
        Ok(text
            .split_whitespace()
            .map(|token| {
                token.trim_matches(|c: char| {
                    matches!(c, ',' | ';' | ':' | '!' | '?' | '(' | ')' | '"' | '.')
                })
            })
            .filter_map(|token| token.parse::<f64>().ok())
            .filter(|n| n.is_finite())
            .collect())
    }

    fn result_value(&self, accepted: Vec<f64>) -> serde_json::Result<JsonValue> {
        serde_json::to_value(accepted.into_iter().next())
    }
}
