//! Typed property accessors.

use crate::bot_state::BotState;
use crate::error::StateError;
use colloquy_core::{Result, TurnContext};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// A typed view over one named property of a [`BotState`] record.
///
/// Reads load the record on first use within a turn. Writes are staged in
/// the turn's cache and reach storage when the owning state is saved.
pub struct StatePropertyAccessor<T> {
    state: BotState,
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for StatePropertyAccessor<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for StatePropertyAccessor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatePropertyAccessor")
            .field("state", &self.state.name())
            .field("name", &self.name)
            .finish()
    }
}

impl BotState {
    /// Creates an accessor for the named property.
    #[must_use]
    pub fn property_accessor<T>(&self, name: impl Into<String>) -> StatePropertyAccessor<T> {
        StatePropertyAccessor {
            state: self.clone(),
            name: name.into(),
            _marker: PhantomData,
        }
    }
}

impl<T> StatePropertyAccessor<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Returns the property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the property, creating it from `default` on first access.
    ///
    /// # Errors
    ///
    /// Returns an error if loading fails or the stored value has the wrong shape.
    pub async fn get(
        &self,
        turn: &mut TurnContext,
        default: impl FnOnce() -> T,
    ) -> Result<T, StateError> {
        if let Some(value) = self.get_optional(turn).await? {
            return Ok(value);
        }
        let value = default();
        self.set(turn, &value).await?;
        Ok(value)
    }

    /// Returns the property if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if loading fails or the stored value has the wrong shape.
    pub async fn get_optional(&self, turn: &mut TurnContext) -> Result<Option<T>, StateError> {
        self.state.load(turn, false).await?;
        let Some(raw) = self.state.property(turn, &self.name) else {
            return Ok(None);
        };
        let value = serde_json::from_value(raw).map_err(|e| StateError::Serialization {
            property: self.name.clone(),
            reason: e.to_string(),
        })?;
        Ok(Some(value))
    }

    /// Stages a new value for the property.
    ///
    /// # Errors
    ///
    /// Returns an error if loading fails or the value cannot be serialized.
    pub async fn set(&self, turn: &mut TurnContext, value: &T) -> Result<(), StateError> {
        self.state.load(turn, false).await?;
        let raw = serde_json::to_value(value).map_err(|e| StateError::Serialization {
            property: self.name.clone(),
            reason: e.to_string(),
        })?;
        self.state.set_property(turn, &self.name, raw);
        Ok(())
    }

    /// Stages removal of the property.
    ///
    /// # Errors
    ///
    /// Returns an error if loading fails.
    pub async fn delete(&self, turn: &mut TurnContext) -> Result<(), StateError> {
        self.state.load(turn, false).await?;
        self.state.remove_property(turn, &self.name);
        Ok(())
    }
}
