//! State persistence for the colloquy engine.
//!
//! This crate provides:
//!
//! - **Storage contract**: versioned key/value reads and optimistic-concurrency writes
//! - **Backends**: an in-process [`MemoryStorage`] and a directory-backed [`FileStorage`]
//! - **Bot state**: conversation- and user-scoped blobs loaded once per turn
//! - **Property accessors**: typed views over one named property of a blob

pub mod accessor;
pub mod bot_state;
pub mod envelope;
pub mod error;
pub mod file;
pub mod memory;
pub mod storage;

pub use accessor::StatePropertyAccessor;
pub use bot_state::{BotState, StateScope};
pub use envelope::Envelope;
pub use error::{StateError, StorageError};
pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use storage::{ExpectedVersion, Storage, StoreItem, WriteItem};
