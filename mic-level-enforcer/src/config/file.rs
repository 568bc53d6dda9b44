//! TOML file settings backend.
//!
//! The settings tree maps onto a TOML document directly: root values are
//! top-level strings and each subkey is a table.
//!
//! ```toml
//! CheckIntervalSeconds = "60"
//!
//! [Mic0]
//! DeviceId = "8c9d1f0e-2b3a-4c5d-9e8f-0a1b2c3d4e5f"
//! DeviceName = "Desk Mic"
//! Volume = "80"
//! ```

use super::store::{SettingsBackend, StoreError};
use super::tree::{SettingsTree, Values};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use toml::{Table, Value};
use tracing::{debug, warn};

/// Default settings file location.
///
/// Uses the platform config directory if available:
/// - Windows: `%APPDATA%\mic-level-enforcer\settings.toml`
/// - Linux: `~/.config/mic-level-enforcer/settings.toml`
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mic-level-enforcer")
        .join("settings.toml")
}

/// Settings tree stored as a TOML file.
#[derive(Debug, Clone)]
pub struct TomlFileBackend {
    path: PathBuf,
}

impl TomlFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Write {
            location: self.location(),
            source,
        }
    }
}

/// Accept strings, and integers as their decimal text, from hand-edited files.
fn scalar_text(key: &str, value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        other => {
            warn!(key, kind = other.type_str(), "Ignoring unsupported settings value");
            None
        }
    }
}

fn table_to_tree(table: Table) -> SettingsTree {
    let mut tree = SettingsTree::new();
    for (key, value) in table {
        match value {
            Value::Table(subkey) => {
                let values: Values = subkey
                    .iter()
                    .filter_map(|(name, v)| scalar_text(name, v).map(|text| (name.clone(), text)))
                    .collect();
                tree.set_subkey(key, values);
            }
            other => {
                if let Some(text) = scalar_text(&key, &other) {
                    tree.set_value(&key, text);
                }
            }
        }
    }
    tree
}

fn tree_to_table(tree: &SettingsTree) -> Table {
    let mut table = Table::new();
    for (name, value) in &tree.values {
        table.insert(name.clone(), Value::String(value.clone()));
    }
    for (name, values) in &tree.subkeys {
        let subkey: Table = values
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        table.insert(name.clone(), Value::Table(subkey));
    }
    table
}

impl SettingsBackend for TomlFileBackend {
    fn read_tree(&self) -> Result<Option<SettingsTree>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Read {
                    location: self.location(),
                    source,
                })
            }
        };

        let contents = String::from_utf8(bytes).map_err(|source| StoreError::Encoding {
            path: self.path.clone(),
            source,
        })?;

        let table: Table = contents.parse().map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })?;

        Ok(Some(table_to_tree(table)))
    }

    /// Atomic write: write to a temp file, sync, then rename over the target.
    fn write_tree(&self, tree: &SettingsTree) -> Result<(), StoreError> {
        let contents = toml::to_string_pretty(&tree_to_table(tree))?;

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| self.write_error(e))?;
                debug!(dir = %dir.display(), "Created settings directory");
            }
        }

        let temp_path = self.path.with_extension("toml.tmp");
        let mut temp_file = fs::File::create(&temp_path).map_err(|e| self.write_error(e))?;
        temp_file
            .write_all(contents.as_bytes())
            .map_err(|e| self.write_error(e))?;
        temp_file.sync_all().map_err(|e| self.write_error(e))?;
        drop(temp_file);

        fs::rename(&temp_path, &self.path).map_err(|e| self.write_error(e))?;
        debug!(path = %self.path.display(), "Settings file replaced");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
