//! Inbound and outbound activities.
//!
//! An activity is one message-like unit exchanged with a channel. Inbound
//! activities start a turn; outbound activities are queued on the
//! [`TurnContext`](crate::TurnContext) and delivered by the caller once the
//! turn's state has been persisted.

use crate::id::ActivityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// The kind of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    /// A user or bot message carrying text.
    Message,
    /// Members joined or left the conversation.
    ConversationUpdate,
    /// The conversation was ended by the channel or the user.
    EndOfConversation,
    /// A structured, channel-specific event.
    Event,
}

/// A participant in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAccount {
    /// Channel-scoped account identifier.
    pub id: String,
    /// Display name, if the channel provides one.
    pub name: Option<String>,
}

impl ChannelAccount {
    /// Creates an account with the given id and no display name.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Identity of a conversation on a channel.
///
/// Conversation-scoped state is keyed by this pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationRef {
    /// The channel the conversation lives on (e.g. "console", "test").
    pub channel_id: String,
    /// Channel-scoped conversation identifier.
    pub conversation_id: String,
}

impl ConversationRef {
    /// Creates a conversation reference.
    #[must_use]
    pub fn new(channel_id: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            conversation_id: conversation_id.into(),
        }
    }
}

impl std::fmt::Display for ConversationRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.channel_id, self.conversation_id)
    }
}

/// A single inbound or outbound activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Unique activity id.
    pub id: ActivityId,
    /// Activity kind.
    pub activity_type: ActivityType,
    /// Message text, for message activities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Structured payload, for event activities or rich replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<JsonValue>,
    /// Locale of the text (e.g. "en-us").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// The conversation this activity belongs to.
    pub conversation: ConversationRef,
    /// Sender.
    pub from: ChannelAccount,
    /// Receiver.
    pub recipient: ChannelAccount,
    /// Members added, for conversation updates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members_added: Vec<ChannelAccount>,
    /// When the activity was created.
    pub timestamp: DateTime<Utc>,
    /// The activity this one replies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<ActivityId>,
}

impl Activity {
    /// Creates an inbound message from `from` to `recipient`.
    #[must_use]
    pub fn message(
        conversation: ConversationRef,
        from: ChannelAccount,
        recipient: ChannelAccount,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: ActivityId::new(),
            activity_type: ActivityType::Message,
            text: Some(text.into()),
            value: None,
            locale: None,
            conversation,
            from,
            recipient,
            members_added: Vec::new(),
            timestamp: Utc::now(),
            reply_to_id: None,
        }
    }

    /// Creates a conversation update announcing `members_added`.
    #[must_use]
    pub fn conversation_update(
        conversation: ConversationRef,
        from: ChannelAccount,
        recipient: ChannelAccount,
        members_added: Vec<ChannelAccount>,
    ) -> Self {
        Self {
            id: ActivityId::new(),
            activity_type: ActivityType::ConversationUpdate,
            text: None,
            value: None,
            locale: None,
            conversation,
            from,
            recipient,
            members_added,
            timestamp: Utc::now(),
            reply_to_id: None,
        }
    }

    /// Sets the locale.
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Builds an outbound text message answering this activity.
    ///
    /// Sender and recipient are swapped and `reply_to_id` points back here.
    #[must_use]
    pub fn reply(&self, text: impl Into<String>) -> Self {
        Self {
            id: ActivityId::new(),
            activity_type: ActivityType::Message,
            text: Some(text.into()),
            value: None,
            locale: self.locale.clone(),
            conversation: self.conversation.clone(),
            from: self.recipient.clone(),
            recipient: self.from.clone(),
            members_added: Vec::new(),
            timestamp: Utc::now(),
            reply_to_id: Some(self.id),
        }
    }

    /// Returns true for message activities.
    #[must_use]
    pub fn is_message(&self) -> bool {
        self.activity_type == ActivityType::Message
    }

    /// Returns the message text, or an empty string.
    #[must_use]
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation() -> ConversationRef {
        ConversationRef::new("test", "conv-1")
    }

    #[test]
    fn reply_swaps_participants() {
        let inbound = Activity::message(
            conversation(),
            ChannelAccount::new("user"),
            ChannelAccount::new("bot"),
            "hello",
        )
        .with_locale("en-us");

        let reply = inbound.reply("hi there");

        assert_eq!(reply.from.id, "bot");
        assert_eq!(reply.recipient.id, "user");
        assert_eq!(reply.reply_to_id, Some(inbound.id));
        assert_eq!(reply.locale.as_deref(), Some("en-us"));
        assert_eq!(reply.text(), "hi there");
        assert_eq!(reply.conversation, inbound.conversation);
    }

    #[test]
    fn conversation_update_is_not_a_message() {
        let update = Activity::conversation_update(
            conversation(),
            ChannelAccount::new("user"),
            ChannelAccount::new("bot"),
            vec![ChannelAccount::new("user").with_name("Ada")],
        );

        assert!(!update.is_message());
        assert_eq!(update.text(), "");
        assert_eq!(update.members_added.len(), 1);
    }

    #[test]
    fn conversation_ref_display() {
        assert_eq!(conversation().to_string(), "test/conv-1");
    }

    #[test]
    fn activity_serde_roundtrip() {
        let activity = Activity::message(
            conversation(),
            ChannelAccount::new("user"),
            ChannelAccount::new("bot"),
            "5th December 2018 at 9am",
        );

        let json = serde_json::to_value(&activity).expect("serialize");
        assert_eq!(json["activity_type"], "message");
        assert!(json.get("members_added").is_none());

        let parsed: Activity = serde_json::from_value(json).expect("deserialize");
        assert_eq!(parsed, activity);
    }
}
