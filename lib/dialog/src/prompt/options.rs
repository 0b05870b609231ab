//! Prompt options.

use serde::{Deserialize, Serialize};

/// What a prompt asks, supplied when the prompt begins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptOptions {
    /// Message rendered when the prompt begins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Message rendered after a rejected answer. Falls back to `prompt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_prompt: Option<String>,
    /// Valid choices, passed through to validators.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
}

impl PromptOptions {
    /// Creates options that render `prompt`.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Self::default()
        }
    }

    /// Sets the retry message.
    #[must_use]
    pub fn with_retry_prompt(mut self, retry_prompt: impl Into<String>) -> Self {
        self.retry_prompt = Some(retry_prompt.into());
        self
    }

    /// Adds a choice.
    #[must_use]
    pub fn with_choice(mut self, choice: Choice) -> Self {
        self.choices.push(choice);
        self
    }

    /// Returns the message to render after a rejection.
    #[must_use]
    pub fn retry_text(&self) -> Option<&str> {
        self.retry_prompt.as_deref().or(self.prompt.as_deref())
    }

    /// Returns the first choice matching `text`.
    #[must_use]
    pub fn find_choice(&self, text: &str) -> Option<&Choice> {
        self.choices.iter().find(|choice| choice.matches(text))
    }
}

/// One valid answer and its synonyms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub value: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
}

impl Choice {
    /// Creates a choice without synonyms.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            synonyms: Vec::new(),
        }
    }

    /// Adds synonyms.
    #[must_use]
    pub fn with_synonyms<I, S>(mut self, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms.extend(synonyms.into_iter().map(Into::into));
        self
    }

    /// Returns true if `text` names this choice, ignoring case and
    /// surrounding whitespace.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        let text = text.trim();
        std::iter::once(&self.value)
            .chain(&self.synonyms)
            .any(|candidate| candidate.eq_ignore_ascii_case(text))
    }
}
