//! Scoped, versioned state blobs.
//!
//! A [`BotState`] owns one storage record per scope key (one per
//! conversation, or one per user). The record is a JSON object of named
//! properties. It is read at most once per turn, cached in the turn-state
//! bag, mutated in memory through [`StatePropertyAccessor`]s, and flushed
//! with an optimistic-concurrency write when the turn ends.
//!
//! [`StatePropertyAccessor`]: crate::StatePropertyAccessor

use crate::error::{StateError, StorageError};
use crate::storage::{ExpectedVersion, Storage, WriteItem};
use colloquy_core::{Result, TurnContext};
use rootcause::Report;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Which identity a state record is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateScope {
    /// One record per conversation.
    Conversation,
    /// One record per user, shared across conversations on a channel.
    User,
}

/// What a state scope loaded for the current turn.
#[derive(Debug, Clone, Default)]
struct CachedState {
    properties: Map<String, JsonValue>,
    snapshot: Map<String, JsonValue>,
    version: Option<u64>,
}

impl CachedState {
    fn is_changed(&self) -> bool {
        self.properties != self.snapshot
    }
}

struct Inner {
    name: String,
    scope: StateScope,
    storage: Arc<dyn Storage>,
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotState")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// A named state scope backed by a [`Storage`].
///
/// Cloning is cheap; clones refer to the same scope.
#[derive(Debug, Clone)]
pub struct BotState {
    inner: Arc<Inner>,
}

impl BotState {
    /// Creates conversation-scoped state.
    #[must_use]
    pub fn conversation(storage: Arc<dyn Storage>) -> Self {
        Self::new("ConversationState", StateScope::Conversation, storage)
    }

    /// Creates user-scoped state.
    #[must_use]
    pub fn user(storage: Arc<dyn Storage>) -> Self {
        Self::new("UserState", StateScope::User, storage)
    }

    fn new(name: &str, scope: StateScope, storage: Arc<dyn Storage>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.to_string(),
                scope,
                storage,
            }),
        }
    }

    /// Returns the name of this scope.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the scope kind.
    #[must_use]
    pub fn scope(&self) -> StateScope {
        self.inner.scope
    }

    /// Derives the storage key for the turn's conversation or user.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::InvalidKey`] if the channel or the identity is empty.
    pub fn storage_key(&self, turn: &TurnContext) -> Result<String, StateError> {
        let activity = turn.activity();
        let channel = &activity.conversation.channel_id;
        let (segment, id) = match self.inner.scope {
            StateScope::Conversation => ("conversations", &activity.conversation.conversation_id),
            StateScope::User => ("users", &activity.from.id),
        };
        if channel.is_empty() {
            return Err(self.invalid_key("activity has no channel id"));
        }
        if id.is_empty() {
            return Err(self.invalid_key(&format!("activity has no id for {segment}")));
        }
        Ok(format!("{channel}/{segment}/{id}"))
    }

    /// Returns true if this scope has been loaded during the turn.
    #[must_use]
    pub fn is_loaded(&self, turn: &TurnContext) -> bool {
        turn.turn_state::<CachedState>(&self.cache_key()).is_some()
    }

    /// Reads the record into the turn's cache.
    ///
    /// Does nothing if the scope is already loaded, unless `force` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or the stored value is not an object.
    #[instrument(skip(self, turn), fields(state = %self.inner.name))]
    pub async fn load(&self, turn: &mut TurnContext, force: bool) -> Result<(), StateError> {
        if !force && self.is_loaded(turn) {
            return Ok(());
        }
        let key = self.storage_key(turn)?;
        let items = self
            .inner
            .storage
            .read(std::slice::from_ref(&key))
            .await
            .map_err(|report| self.storage_failure(report, &key))?;

        let cached = match items.get(&key) {
            Some(item) => {
                let properties = match &item.value {
                    JsonValue::Object(map) => map.clone(),
                    JsonValue::Null => Map::new(),
                    other => {
                        return Err(StateError::Serialization {
                            property: self.inner.name.clone(),
                            reason: format!("expected an object, found {}", json_type(other)),
                        }
                        .into());
                    }
                };
                CachedState {
                    snapshot: properties.clone(),
                    properties,
                    version: Some(item.version),
                }
            }
            None => CachedState::default(),
        };
        debug!(%key, version = ?cached.version, "loaded state");
        turn.set_turn_state(self.cache_key(), cached);
        Ok(())
    }

    /// Writes the cached record back if anything changed.
    ///
    /// Without `force` the write is guarded by the version read at load time,
    /// so a concurrent writer makes this fail with a conflict. With `force`
    /// the record is written unconditionally. Calling this when nothing
    /// changed since the last load or save is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Storage`] whose `kind()` is
    /// [`ErrorKind::Conflict`](colloquy_core::ErrorKind::Conflict) if the
    /// record changed underneath this turn.
    #[instrument(skip(self, turn), fields(state = %self.inner.name))]
    pub async fn save_changes(&self, turn: &mut TurnContext, force: bool) -> Result<(), StateError> {
        let Some(cached) = turn.turn_state::<CachedState>(&self.cache_key()) else {
            return Ok(());
        };
        if !force && !cached.is_changed() {
            return Ok(());
        }

        let key = self.storage_key(turn)?;
        let expected = match (force, cached.version) {
            (true, _) => ExpectedVersion::Any,
            (false, Some(version)) => ExpectedVersion::Exact(version),
            (false, None) => ExpectedVersion::New,
        };
        let value = JsonValue::Object(cached.properties.clone());
        let versions = self
            .inner
            .storage
            .write(HashMap::from([(key.clone(), WriteItem { value, expected })]))
            .await
            .map_err(|report| self.storage_failure(report, &key))?;

        let version = versions.get(&key).copied();
        if let Some(cached) = turn.turn_state_mut::<CachedState>(&self.cache_key()) {
            cached.snapshot = cached.properties.clone();
            cached.version = version;
        }
        debug!(%key, ?version, "saved state");
        Ok(())
    }

    /// Empties the record. The empty record is persisted on the next save.
    ///
    /// # Errors
    ///
    /// Returns an error if the record has to be loaded first and loading fails.
    pub async fn clear(&self, turn: &mut TurnContext) -> Result<(), StateError> {
        self.load(turn, false).await?;
        if let Some(cached) = turn.turn_state_mut::<CachedState>(&self.cache_key()) {
            cached.properties.clear();
        }
        Ok(())
    }

    /// Removes the record from storage and from the turn's cache.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn delete(&self, turn: &mut TurnContext) -> Result<(), StateError> {
        let key = self.storage_key(turn)?;
        turn.remove_turn_state(&self.cache_key());
        self.inner
            .storage
            .delete(std::slice::from_ref(&key))
            .await
            .map_err(|report| self.storage_failure(report, &key))?;
        debug!(%key, "deleted state");
        Ok(())
    }

    pub(crate) fn property(&self, turn: &TurnContext, name: &str) -> Option<JsonValue> {
        turn.turn_state::<CachedState>(&self.cache_key())
            .and_then(|cached| cached.properties.get(name).cloned())
    }

    pub(crate) fn set_property(&self, turn: &mut TurnContext, name: &str, value: JsonValue) {
        let key = self.cache_key();
        if turn.turn_state::<CachedState>(&key).is_none() {
            turn.set_turn_state(key.clone(), CachedState::default());
        }
        if let Some(cached) = turn.turn_state_mut::<CachedState>(&key) {
            cached.properties.insert(name.to_string(), value);
        }
    }

    pub(crate) fn remove_property(&self, turn: &mut TurnContext, name: &str) {
        if let Some(cached) = turn.turn_state_mut::<CachedState>(&self.cache_key()) {
            cached.properties.remove(name);
        }
    }

    fn cache_key(&self) -> String {
        let scope = match self.inner.scope {
            StateScope::Conversation => "conversation",
            StateScope::User => "user",
        };
        format!("colloquy.state.{scope}.{}", self.inner.name)
    }

    fn invalid_key(&self, reason: &str) -> Report<StateError> {
        Report::from(StateError::InvalidKey {
            state: self.inner.name.clone(),
            reason: reason.to_string(),
        })
    }

    fn storage_failure(&self, report: Report<StorageError>, key: &str) -> Report<StateError> {
        let cause = report.current_context().kind();
        report.context(StateError::Storage {
            state: self.inner.name.clone(),
            key: key.to_string(),
            cause,
        })
    }
}

fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
