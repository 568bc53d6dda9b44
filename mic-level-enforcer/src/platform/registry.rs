//! Windows Registry settings backend.
//!
//! Stores the settings tree under `HKCU\Software\SACK Corporation\MicLevelTrayApp`
//! as REG_SZ values, one subkey per target slot.

use crate::config::tree::{SettingsTree, Values};
use crate::config::{SettingsBackend, StoreError};
use tracing::debug;
use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Foundation::{ERROR_FILE_NOT_FOUND, WIN32_ERROR};
use windows::Win32::System::Registry::{
    RegCloseKey, RegCreateKeyExW, RegDeleteTreeW, RegEnumKeyExW, RegEnumValueW, RegGetValueW,
    RegOpenKeyExW, RegRenameKey, RegSetValueExW, HKEY, HKEY_CURRENT_USER, KEY_ALL_ACCESS,
    KEY_READ, REG_OPTION_NON_VOLATILE, REG_SAM_FLAGS, REG_SZ, RRF_RT_REG_SZ,
};

/// Suffix of the subkey a slot is written to before it replaces the old one.
const STAGING_SUFFIX: &str = ".pending";

/// Longest registry key name, plus terminator.
const MAX_KEY_NAME: usize = 256;

/// Longest registry value name, plus terminator.
const MAX_VALUE_NAME: usize = 16_384;

fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn access_error(what: &str, name: &str, status: WIN32_ERROR) -> StoreError {
    StoreError::RegistryAccess(format!("{} '{}' failed with code {}", what, name, status.0))
}

/// Open registry key, closed on drop.
struct RegKey(HKEY);

impl RegKey {
    /// Open an existing subkey. `Ok(None)` when it does not exist.
    fn open(parent: HKEY, path: &str, access: REG_SAM_FLAGS) -> Result<Option<Self>, StoreError> {
        let path_wide = to_wide(path);
        let mut hkey = HKEY::default();
        let status = unsafe {
            RegOpenKeyExW(parent, PCWSTR::from_raw(path_wide.as_ptr()), 0, access, &mut hkey)
        };

        if status == ERROR_FILE_NOT_FOUND {
            Ok(None)
        } else if status.is_err() {
            Err(access_error("Opening key", path, status))
        } else {
            Ok(Some(Self(hkey)))
        }
    }

    /// Open a subkey, creating it if needed.
    fn create(parent: HKEY, path: &str) -> Result<Self, StoreError> {
        let path_wide = to_wide(path);
        let mut hkey = HKEY::default();
        let status = unsafe {
            RegCreateKeyExW(
                parent,
                PCWSTR::from_raw(path_wide.as_ptr()),
                0,
                PCWSTR::null(),
                REG_OPTION_NON_VOLATILE,
                KEY_ALL_ACCESS,
                None,
                &mut hkey,
                None,
            )
        };

        if status.is_err() {
            Err(StoreError::RegistryWrite {
                key: path.to_string(),
            })
        } else {
            Ok(Self(hkey))
        }
    }

    fn subkey_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut index = 0;
        loop {
            let mut buf = [0u16; MAX_KEY_NAME];
            let mut len = buf.len() as u32;
            let status = unsafe {
                RegEnumKeyExW(
                    self.0,
                    index,
                    PWSTR(buf.as_mut_ptr()),
                    &mut len,
                    None,
                    PWSTR::null(),
                    None,
                    None,
                )
            };
            // ERROR_NO_MORE_ITEMS ends the enumeration
            if status.is_err() {
                break;
            }
            names.push(String::from_utf16_lossy(&buf[..len as usize]));
            index += 1;
        }
        names
    }

    fn value_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut buf = vec![0u16; MAX_VALUE_NAME];
        let mut index = 0;
        loop {
            let mut len = buf.len() as u32;
            let status = unsafe {
                RegEnumValueW(
                    self.0,
                    index,
                    PWSTR(buf.as_mut_ptr()),
                    &mut len,
                    None,
                    None,
                    None,
                    None,
                )
            };
            if status.is_err() {
                break;
            }
            names.push(String::from_utf16_lossy(&buf[..len as usize]));
            index += 1;
        }
        names
    }

    /// Read a REG_SZ value. Values of other types read as `None`.
    fn string_value(&self, name: &str) -> Option<String> {
        let name_wide = to_wide(name);
        unsafe {
            let mut size = 0u32;
            let status = RegGetValueW(
                self.0,
                PCWSTR::null(),
                PCWSTR::from_raw(name_wide.as_ptr()),
                RRF_RT_REG_SZ,
                None,
                None,
                Some(&mut size),
            );
            if status.is_err() {
                return None;
            }

            let mut buf = vec![0u16; (size as usize).div_ceil(2) + 1];
            let mut size = (buf.len() * 2) as u32;
            let status = RegGetValueW(
                self.0,
                PCWSTR::null(),
                PCWSTR::from_raw(name_wide.as_ptr()),
                RRF_RT_REG_SZ,
                None,
                Some(buf.as_mut_ptr().cast()),
                Some(&mut size),
            );
            if status.is_err() {
                return None;
            }

            let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
            Some(String::from_utf16_lossy(&buf[..len]))
        }
    }

    fn values(&self) -> Values {
        self.value_names()
            .into_iter()
            .filter_map(|name| self.string_value(&name).map(|value| (name, value)))
            .collect()
    }

    fn set_string_value(&self, name: &str, value: &str) -> Result<(), StoreError> {
        let name_wide = to_wide(name);
        let value_wide = to_wide(value);
        let status = unsafe {
            RegSetValueExW(
                self.0,
                PCWSTR::from_raw(name_wide.as_ptr()),
                0,
                REG_SZ,
                Some(std::slice::from_raw_parts(
                    value_wide.as_ptr() as *const u8,
                    value_wide.len() * 2,
                )),
            )
        };

        if status.is_err() {
            Err(StoreError::RegistryWrite {
                key: name.to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Delete a subkey and everything below it. Missing keys are fine.
    fn delete_subtree(&self, name: &str) -> Result<(), StoreError> {
        let name_wide = to_wide(name);
        let status = unsafe { RegDeleteTreeW(self.0, PCWSTR::from_raw(name_wide.as_ptr())) };
        if status.is_err() && status != ERROR_FILE_NOT_FOUND {
            return Err(access_error("Deleting key", name, status));
        }
        Ok(())
    }

    fn rename_subkey(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let from_wide = to_wide(from);
        let to_wide_name = to_wide(to);
        let status = unsafe {
            RegRenameKey(
                self.0,
                PCWSTR::from_raw(from_wide.as_ptr()),
                PCWSTR::from_raw(to_wide_name.as_ptr()),
            )
        };
        if status.is_err() {
            return Err(access_error("Renaming key", from, status));
        }
        Ok(())
    }
}

impl Drop for RegKey {
    fn drop(&mut self) {
        unsafe {
            let _ = RegCloseKey(self.0);
        }
    }
}

/// Registry-based settings backend.
pub struct RegistryBackend {
    key_path: String,
}

impl RegistryBackend {
    pub const APP_KEY: &'static str = r"Software\SACK Corporation\MicLevelTrayApp";

    /// Backend at the standard location.
    pub fn new() -> Self {
        Self::at(Self::APP_KEY)
    }

    /// Backend rooted at another key under HKEY_CURRENT_USER.
    pub fn at(key_path: &str) -> Self {
        Self {
            key_path: key_path.to_string(),
        }
    }
}

impl Default for RegistryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsBackend for RegistryBackend {
    fn read_tree(&self) -> Result<Option<SettingsTree>, StoreError> {
        let Some(root) = RegKey::open(HKEY_CURRENT_USER, &self.key_path, KEY_READ)? else {
            return Ok(None);
        };

        let mut tree = SettingsTree::new();
        tree.values = root.values();
        for name in root.subkey_names() {
            // left behind by an interrupted save
            if name.ends_with(STAGING_SUFFIX) {
                continue;
            }
            if let Some(subkey) = RegKey::open(root.0, &name, KEY_READ)? {
                tree.set_subkey(name, subkey.values());
            }
        }
        Ok(Some(tree))
    }

    /// Each slot is written to a staging subkey, then swapped in, so a
    /// crash leaves either the old slot, the new slot, or a gap that ends
    /// the list on the next load.
    fn write_tree(&self, tree: &SettingsTree) -> Result<(), StoreError> {
        let root = RegKey::create(HKEY_CURRENT_USER, &self.key_path)?;

        for name in root.subkey_names() {
            if !tree.subkeys.contains_key(&name) {
                root.delete_subtree(&name)?;
                debug!(subkey = %name, "Removed stale settings subkey");
            }
        }

        for (name, value) in &tree.values {
            root.set_string_value(name, value)?;
        }

        for (name, values) in &tree.subkeys {
            let staging = format!("{}{}", name, STAGING_SUFFIX);
            root.delete_subtree(&staging)?;
            {
                let key = RegKey::create(root.0, &staging)?;
                for (value_name, value) in values {
                    key.set_string_value(value_name, value)?;
                }
            }
            root.delete_subtree(name)?;
            root.rename_subkey(&staging, name)?;
        }

        Ok(())
    }

    fn location(&self) -> String {
        format!(r"HKEY_CURRENT_USER\{}", self.key_path)
    }
}
