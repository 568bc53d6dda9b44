//! Configuration model, persistence and editing.

pub mod file;
pub mod model;
pub mod session;
pub mod shared;
pub mod store;
pub mod tree;

pub use file::{default_settings_path, TomlFileBackend};
pub use model::{
    clamp_volume, Configuration, Target, Upsert, DEFAULT_POLL_INTERVAL_SECS,
    MAX_POLL_INTERVAL_SECS, MIN_POLL_INTERVAL_SECS,
};
pub use session::EditSession;
pub use shared::SharedConfig;
pub use store::{ConfigStore, MemoryBackend, SettingsBackend, StoreError};
pub use tree::SettingsTree;
