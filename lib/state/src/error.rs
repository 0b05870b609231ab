//! Error types for the state crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `StorageError`: Failures of a storage backend
//! - `StateError`: Failures loading, saving or reading bot state (wraps
//!   storage reports via context and keeps their [`ErrorKind`])

use crate::storage::ExpectedVersion;
use colloquy_core::ErrorKind;
use std::fmt;

/// Errors from storage backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The stored version did not match the writer's expectation.
    Conflict {
        key: String,
        expected: ExpectedVersion,
        actual: Option<u64>,
    },
    /// A stored record could not be decoded.
    Corrupt { key: String, reason: String },
    /// The backend itself failed (I/O, connectivity).
    Backend { reason: String },
}

impl StorageError {
    /// Returns the classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Corrupt { .. } | Self::Backend { .. } => ErrorKind::Storage,
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict {
                key,
                expected,
                actual,
            } => match actual {
                Some(version) => write!(
                    f,
                    "version conflict on '{key}': expected {expected}, found version {version}"
                ),
                None => write!(
                    f,
                    "version conflict on '{key}': expected {expected}, found no record"
                ),
            },
            Self::Corrupt { key, reason } => {
                write!(f, "stored record '{key}' is corrupt: {reason}")
            }
            Self::Backend { reason } => write!(f, "storage backend failed: {reason}"),
        }
    }
}

impl std::error::Error for StorageError {}

/// Errors from bot state operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// A storage operation failed (use as context wrapper).
    Storage {
        state: String,
        key: String,
        cause: ErrorKind,
    },
    /// The storage key could not be derived from the turn.
    InvalidKey { state: String, reason: String },
    /// A property could not be (de)serialized.
    Serialization { property: String, reason: String },
}

impl StateError {
    /// Returns the classification of this error.
    ///
    /// Context wrappers report the kind of the failure they wrap.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Storage { cause, .. } => *cause,
            Self::InvalidKey { .. } | Self::Serialization { .. } => ErrorKind::InvalidInput,
        }
    }
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage { state, key, cause } => {
                write!(f, "{state} storage operation on '{key}' failed ({cause})")
            }
            Self::InvalidKey { state, reason } => {
                write!(f, "cannot derive {state} storage key: {reason}")
            }
            Self::Serialization { property, reason } => {
                write!(f, "property '{property}' could not be serialized: {reason}")
            }
        }
    }
}

impl std::error::Error for StateError {}
