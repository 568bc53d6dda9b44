//! Durable configuration store.
//!
//! [`ConfigStore`] owns the load/save policy; a [`SettingsBackend`]
//! moves whole [`SettingsTree`]s to and from the medium.

use super::model::Configuration;
use super::tree::SettingsTree;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Persistence error types.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read settings from {location}: {source}")]
    Read {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write settings to {location}: {source}")]
    Write {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings file {path} is not valid TOML: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Settings file {path} is not valid UTF-8: {source}")]
    Encoding {
        path: PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to access registry: {0}")]
    RegistryAccess(String),

    #[error("Failed to write registry value: {key}")]
    RegistryWrite { key: String },
}

/// A medium that stores one settings tree.
pub trait SettingsBackend: Send + Sync {
    /// Read the whole tree. `Ok(None)` when nothing has been stored yet.
    fn read_tree(&self) -> Result<Option<SettingsTree>, StoreError>;

    /// Replace the stored tree.
    ///
    /// Must not leave a half-written tree that reads back as valid.
    fn write_tree(&self, tree: &SettingsTree) -> Result<(), StoreError>;

    /// Human-readable location, for logs.
    fn location(&self) -> String;
}

/// Loads and saves the [`Configuration`] through a backend.
pub struct ConfigStore<B> {
    backend: B,
}

impl<B: SettingsBackend> ConfigStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Load the persisted configuration.
    ///
    /// A missing store yields the default configuration. I/O failures and
    /// an undecodable file are errors.
    pub fn load(&self) -> Result<Configuration, StoreError> {
        match self.backend.read_tree()? {
            Some(tree) => {
                let config = tree.to_configuration();
                info!(
                    location = %self.backend.location(),
                    targets = config.targets.len(),
                    poll_interval_seconds = config.poll_interval_seconds,
                    "Configuration loaded"
                );
                Ok(config)
            }
            None => {
                info!(location = %self.backend.location(), "No stored configuration, using defaults");
                Ok(Configuration::default())
            }
        }
    }

    /// Persist the full configuration, replacing whatever was stored.
    pub fn save(&self, config: &Configuration) -> Result<(), StoreError> {
        let mut tree = match self.backend.read_tree() {
            Ok(tree) => tree.unwrap_or_default(),
            Err(e @ (StoreError::Parse { .. } | StoreError::Encoding { .. })) => {
                warn!(error = %e, "Overwriting unreadable settings file");
                SettingsTree::new()
            }
            Err(e) => return Err(e),
        };
        tree.store_configuration(config);
        self.backend.write_tree(&tree)?;

        info!(
            location = %self.backend.location(),
            targets = config.targets.len(),
            "Configuration saved"
        );
        Ok(())
    }
}

/// Backend kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tree: Mutex<Option<SettingsTree>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing tree, e.g. a hand-edited one.
    pub fn with_tree(tree: SettingsTree) -> Self {
        Self {
            tree: Mutex::new(Some(tree)),
        }
    }

    /// Snapshot of the stored tree.
    pub fn tree(&self) -> Option<SettingsTree> {
        self.tree
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SettingsBackend for MemoryBackend {
    fn read_tree(&self) -> Result<Option<SettingsTree>, StoreError> {
        Ok(self.tree())
    }

    fn write_tree(&self, tree: &SettingsTree) -> Result<(), StoreError> {
        debug!(subkeys = tree.subkeys.len(), "Writing in-memory settings tree");
        *self.tree.lock().unwrap_or_else(PoisonError::into_inner) = Some(tree.clone());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

impl<B: SettingsBackend + ?Sized> SettingsBackend for Box<B> {
    fn read_tree(&self) -> Result<Option<SettingsTree>, StoreError> {
        (**self).read_tree()
    }

    fn write_tree(&self, tree: &SettingsTree) -> Result<(), StoreError> {
        (**self).write_tree(tree)
    }

    fn location(&self) -> String {
        (**self).location()
    }
}
