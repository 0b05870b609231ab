//! Console configuration.
//!
//! Loaded via the `config` crate from `COLLOQUY__`-prefixed environment
//! variables, with `__` separating nested keys:
//!
//! ```text
//! COLLOQUY__STORAGE__BACKEND=file
//! COLLOQUY__STORAGE__DIRECTORY=/var/lib/colloquy
//! COLLOQUY__DIALOGS__MAX_DISPATCH_DEPTH=32
//! ```

use colloquy_bot::AdapterSettings;
use colloquy_dialog::DialogSettings;
use serde::Deserialize;
use std::path::PathBuf;

/// Console configuration composed from library settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub dialogs: DialogSettings,

    #[serde(default)]
    pub adapter: AdapterSettings,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

/// Where conversation state is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Lost when the process exits.
    #[default]
    Memory,
    /// One JSON file per record under `directory`.
    File,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory for the file backend.
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
}

fn default_directory() -> PathBuf {
    PathBuf::from("colloquy-state")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            directory: default_directory(),
        }
    }
}

/// Identities used for the console conversation.
///
/// Keeping the conversation id stable across runs is what lets the file
/// backend resume a conversation after a restart.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_conversation_id")]
    pub conversation_id: String,

    #[serde(default = "default_user_id")]
    pub user_id: String,
}

fn default_conversation_id() -> String {
    "console".to_string()
}

fn default_user_id() -> String {
    "user".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            conversation_id: default_conversation_id(),
            user_id: default_user_id(),
        }
    }
}

impl ConsoleConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::load(config::Environment::with_prefix("COLLOQUY"))
    }

    fn load(environment: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                environment
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
