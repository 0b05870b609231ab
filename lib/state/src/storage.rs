//! The storage contract.
//!
//! Storage is a versioned key/value store. Every record carries a
//! monotonically increasing version assigned by the store; writers state
//! which version they read, and a write whose expectation no longer holds
//! is rejected with [`StorageError::Conflict`](crate::StorageError::Conflict).
//! The caller is expected to reload and reapply.

use crate::error::StorageError;
use async_trait::async_trait;
use colloquy_core::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;

/// A stored value together with its current version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreItem {
    /// The stored blob.
    pub value: JsonValue,
    /// Version assigned by the store on the last successful write.
    pub version: u64,
}

/// What a writer believes about the record it is replacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedVersion {
    /// The record must not exist yet.
    New,
    /// The record must currently be at exactly this version.
    Exact(u64),
    /// Last writer wins.
    Any,
}

impl ExpectedVersion {
    /// Returns true if a record currently at `current` satisfies this expectation.
    #[must_use]
    pub fn matches(&self, current: Option<u64>) -> bool {
        match (self, current) {
            (Self::Any, _) => true,
            (Self::New, None) => true,
            (Self::Exact(expected), Some(actual)) => *expected == actual,
            _ => false,
        }
    }
}

impl fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "no record"),
            Self::Exact(version) => write!(f, "version {version}"),
            Self::Any => write!(f, "any version"),
        }
    }
}

/// A pending write.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteItem {
    /// The blob to store.
    pub value: JsonValue,
    /// The version the writer read.
    pub expected: ExpectedVersion,
}

impl WriteItem {
    /// Creates a write that must not overwrite an existing record.
    #[must_use]
    pub fn new(value: JsonValue) -> Self {
        Self {
            value,
            expected: ExpectedVersion::New,
        }
    }

    /// Creates a write guarded by the version that was read.
    #[must_use]
    pub fn replacing(value: JsonValue, version: u64) -> Self {
        Self {
            value,
            expected: ExpectedVersion::Exact(version),
        }
    }

    /// Creates an unconditional write.
    #[must_use]
    pub fn forced(value: JsonValue) -> Self {
        Self {
            value,
            expected: ExpectedVersion::Any,
        }
    }
}

/// Returns the version the record under `key` gets after a successful write.
///
/// # Errors
///
/// Returns [`StorageError::Corrupt`] if the current version cannot be
/// incremented.
pub fn next_version(key: &str, current: Option<u64>) -> Result<u64, StorageError> {
    match current {
        None => Ok(1),
        Some(version) => version.checked_add(1).ok_or_else(|| {
            StorageError::Corrupt {
                key: key.to_string(),
                reason: format!("version {version} cannot be incremented"),
            }
            .into()
        }),
    }
}

/// Trait for state storage backends.
///
/// Every expectation and every new version in a `write` batch is checked
/// before any key is modified, so a conflict leaves the store untouched.
/// Backends without multi-key transactions may still fail on an I/O error
/// after some keys of the batch were replaced; each key is then either at
/// its old or its new value, never partially written.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Reads the given keys. Missing keys are absent from the result.
    async fn read(&self, keys: &[String]) -> Result<HashMap<String, StoreItem>, StorageError>;

    /// Writes a batch, returning the new version of every written key.
    async fn write(
        &self,
        changes: HashMap<String, WriteItem>,
    ) -> Result<HashMap<String, u64>, StorageError>;

    /// Deletes the given keys. Missing keys are ignored.
    async fn delete(&self, keys: &[String]) -> Result<(), StorageError>;
}
