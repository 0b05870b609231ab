//! Scripted conversations for tests.
//!
//! ```ignore
//! let mut flow = TestFlow::new(adapter, bot);
//! flow.send("hi").await?.assert_reply("What date would you like?");
//! ```

use crate::adapter::TurnAdapter;
use crate::bot::Bot;
use crate::error::TurnError;
use colloquy_core::{Activity, ChannelAccount, ConversationRef, Result};
use std::collections::VecDeque;
use std::sync::Arc;

const CHANNEL: &str = "test";
const CONVERSATION: &str = "conversation-1";
const USER: &str = "user";
const BOT: &str = "bot";

/// Drives one conversation through a [`TurnAdapter`] and checks the replies.
pub struct TestFlow {
    adapter: TurnAdapter,
    bot: Arc<dyn Bot>,
    locale: Option<String>,
    replies: VecDeque<Activity>,
}

impl TestFlow {
    pub fn new(adapter: TurnAdapter, bot: impl Bot + 'static) -> Self {
        Self {
            adapter,
            bot: Arc::new(bot),
            locale: None,
            replies: VecDeque::new(),
        }
    }

    /// Stamps every message sent from now on with `locale`.
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// The conversation every activity belongs to.
    #[must_use]
    pub fn conversation() -> ConversationRef {
        ConversationRef::new(CHANNEL, CONVERSATION)
    }

    /// A message from the user to the bot.
    #[must_use]
    pub fn activity(text: &str) -> Activity {
        Activity::message(
            Self::conversation(),
            ChannelAccount::new(USER),
            ChannelAccount::new(BOT),
            text,
        )
    }

    /// Sends a user message and queues the replies.
    ///
    /// # Errors
    ///
    /// Returns whatever the turn failed with; nothing is queued then.
    pub async fn send(&mut self, text: &str) -> Result<&mut Self, TurnError> {
        let mut activity = Self::activity(text);
        activity.locale.clone_from(&self.locale);
        self.send_activity(activity).await
    }

    /// Announces that `member_id` joined the conversation.
    ///
    /// # Errors
    ///
    /// Returns whatever the turn failed with.
    pub async fn join(&mut self, member_id: &str) -> Result<&mut Self, TurnError> {
        let activity = Activity::conversation_update(
            Self::conversation(),
            ChannelAccount::new(USER),
            ChannelAccount::new(BOT),
            vec![ChannelAccount::new(member_id)],
        );
        self.send_activity(activity).await
    }

    /// Sends an arbitrary activity and queues the replies.
    ///
    /// # Errors
    ///
    /// Returns whatever the turn failed with.
    pub async fn send_activity(&mut self, activity: Activity) -> Result<&mut Self, TurnError> {
        let replies = self
            .adapter
            .process_activity(activity, self.bot.as_ref())
            .await?;
        self.replies.extend(replies);
        Ok(self)
    }

    /// Pops the next reply and checks its text.
    ///
    /// # Panics
    ///
    /// Panics if there is no reply or its text differs.
    #[track_caller]
    pub fn assert_reply(&mut self, expected: &str) -> &mut Self {
        match self.replies.pop_front() {
            Some(reply) => assert_eq!(reply.text(), expected, "unexpected reply"),
            None => panic!("expected reply {expected:?}, got none"),
        }
        self
    }

    /// Checks that every reply has been consumed.
    ///
    /// # Panics
    ///
    /// Panics if a reply is still queued.
    #[track_caller]
    pub fn assert_no_reply(&mut self) -> &mut Self {
        if let Some(reply) = self.replies.front() {
            panic!("expected no reply, got {:?}", reply.text());
        }
        self
    }
}

impl std::fmt::Debug for TestFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestFlow")
            .field("adapter", &self.adapter)
            .field("locale", &self.locale)
            .field("pending_replies", &self.replies.len())
            .finish_non_exhaustive()
    }
}
