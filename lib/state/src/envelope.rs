//! Format-versioned envelope for records written to disk.
//!
//! Every record a durable backend persists is wrapped in this envelope so
//! the on-disk layout can evolve: a reader that finds a format it does not
//! understand refuses the record instead of misreading it.

use serde::{Deserialize, Serialize};

/// The current on-disk record format.
pub const FORMAT_VERSION: u32 = 1;

/// A format-versioned wrapper around a persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// The on-disk format of the record.
    pub format: u32,
    /// The wrapped record.
    pub record: T,
}

impl<T> Envelope<T> {
    /// Wraps a record in the current format.
    #[must_use]
    pub fn new(record: T) -> Self {
        Self {
            format: FORMAT_VERSION,
            record,
        }
    }

    /// Unwraps the envelope, returning the record.
    #[must_use]
    pub fn into_record(self) -> T {
        self.record
    }

    /// Returns true if the record uses the current format.
    #[must_use]
    pub fn is_current_format(&self) -> bool {
        self.format == FORMAT_VERSION
    }
}

impl<T: Serialize> Envelope<T> {
    /// Serializes the envelope to pretty-printed JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

impl<T: for<'de> Deserialize<'de>> Envelope<T> {
    /// Deserializes an envelope from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
