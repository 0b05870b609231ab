//! Per-turn context.
//!
//! A [`TurnContext`] lives for exactly one inbound activity. It owns the
//! inbound activity, the queue of replies produced during the turn, and a
//! typed state bag that layers above use to cache whatever they loaded for
//! this turn (for example, the conversation's persisted state blob).

use crate::activity::{Activity, ConversationRef};
use crate::id::{ActivityId, TurnId};
use std::any::Any;
use std::collections::HashMap;
use tracing::debug;

/// Context for a single turn of a conversation.
pub struct TurnContext {
    id: TurnId,
    activity: Activity,
    responses: Vec<Activity>,
    responded: bool,
    turn_state: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl TurnContext {
    /// Creates a context for the given inbound activity.
    #[must_use]
    pub fn new(activity: Activity) -> Self {
        Self {
            id: TurnId::new(),
            activity,
            responses: Vec::new(),
            responded: false,
            turn_state: HashMap::new(),
        }
    }

    /// Returns the turn id.
    #[must_use]
    pub fn id(&self) -> TurnId {
        self.id
    }

    /// Returns the inbound activity.
    #[must_use]
    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    /// Returns the conversation this turn belongs to.
    #[must_use]
    pub fn conversation(&self) -> &ConversationRef {
        &self.activity.conversation
    }

    /// Queues an outbound activity.
    pub fn send_activity(&mut self, activity: Activity) -> ActivityId {
        let id = activity.id;
        debug!(turn_id = %self.id, activity_id = %id, "queued outbound activity");
        self.responses.push(activity);
        self.responded = true;
        id
    }

    /// Queues a text reply to the inbound activity.
    pub fn send_text(&mut self, text: impl Into<String>) -> ActivityId {
        let reply = self.activity.reply(text);
        self.send_activity(reply)
    }

    /// Returns true once anything has been queued during this turn.
    #[must_use]
    pub fn responded(&self) -> bool {
        self.responded
    }

    /// Returns the outbound activities queued so far.
    #[must_use]
    pub fn responses(&self) -> &[Activity] {
        &self.responses
    }

    /// Drains the outbound queue.
    pub fn take_responses(&mut self) -> Vec<Activity> {
        std::mem::take(&mut self.responses)
    }

    /// Returns a typed turn-state entry.
    #[must_use]
    pub fn turn_state<T: Any>(&self, key: &str) -> Option<&T> {
        self.turn_state.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// Returns a mutable typed turn-state entry.
    pub fn turn_state_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.turn_state
            .get_mut(key)
            .and_then(|v| v.downcast_mut::<T>())
    }

    /// Stores a turn-state entry, replacing any previous value under `key`.
    pub fn set_turn_state<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.turn_state.insert(key.into(), Box::new(value));
    }

    /// Removes a turn-state entry.
    pub fn remove_turn_state(&mut self, key: &str) -> bool {
        self.turn_state.remove(key).is_some()
    }
}

impl std::fmt::Debug for TurnContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnContext")
            .field("id", &self.id)
            .field("activity", &self.activity.id)
            .field("responses", &self.responses.len())
            .field("turn_state", &self.turn_state.keys().collect::<Vec<_>>())
            .finish()
    }
}
