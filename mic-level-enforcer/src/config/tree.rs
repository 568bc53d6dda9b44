//! Flat key/value settings tree and the slot layout stored in it.
//!
//! ```text
//! root/
//!   CheckIntervalSeconds = "60"
//!   Mic0/ { DeviceId, DeviceName, Volume }
//!   Mic1/ ...
//! ```
//!
//! Slots are 0-based and contiguous. Decoding stops at the first missing
//! slot.

use super::model::{clamp_poll_interval, Configuration, Target, DEFAULT_POLL_INTERVAL_SECS};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const INTERVAL_VALUE: &str = "CheckIntervalSeconds";
pub const DEVICE_ID_VALUE: &str = "DeviceId";
pub const DEVICE_NAME_VALUE: &str = "DeviceName";
pub const VOLUME_VALUE: &str = "Volume";

const SLOT_PREFIX: &str = "Mic";

/// Name of the subkey holding target `index`.
pub fn slot_name(index: usize) -> String {
    format!("{}{}", SLOT_PREFIX, index)
}

/// True for subkey names of the form `Mic<digits>`.
pub fn is_slot_name(name: &str) -> bool {
    name.strip_prefix(SLOT_PREFIX)
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// String values of one key.
pub type Values = BTreeMap<String, String>;

/// A root key with string values and one level of named subkeys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsTree {
    pub values: Values,
    pub subkeys: BTreeMap<String, Values>,
}

impl SettingsTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn set_value(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn subkey(&self, name: &str) -> Option<&Values> {
        self.subkeys.get(name)
    }

    pub fn set_subkey(&mut self, name: impl Into<String>, values: Values) {
        self.subkeys.insert(name.into(), values);
    }

    /// Decode the configuration held in this tree.
    ///
    /// Malformed records are skipped and a malformed interval falls back
    /// to the default. Never fails.
    pub fn to_configuration(&self) -> Configuration {
        let poll_interval_seconds = match self.value(INTERVAL_VALUE).map(str::trim) {
            Some(raw) => match raw.parse::<i64>() {
                Ok(seconds) => {
                    let clamped = clamp_poll_interval(seconds);
                    if i64::from(clamped) != seconds {
                        warn!(seconds, clamped, "Poll interval out of range, clamping");
                    }
                    clamped
                }
                Err(_) => {
                    warn!(value = raw, "Malformed poll interval, using default");
                    DEFAULT_POLL_INTERVAL_SECS
                }
            },
            None => DEFAULT_POLL_INTERVAL_SECS,
        };

        let mut targets = Vec::new();
        let mut index = 0;
        while let Some(slot) = self.subkey(&slot_name(index)) {
            match decode_target(slot) {
                Some(target) => targets.push(target),
                None => warn!(slot = %slot_name(index), "Skipping malformed target"),
            }
            index += 1;
        }

        let orphaned = self.unreachable_slots(index);
        if orphaned > 0 {
            warn!(
                gap = %slot_name(index),
                orphaned,
                "Target slots found after a gap were ignored"
            );
        }

        debug!(targets = targets.len(), poll_interval_seconds, "Decoded settings tree");

        Configuration {
            targets,
            poll_interval_seconds,
        }
    }

    /// Slot-like subkeys the decoder never visits when it stops at `gap`.
    fn unreachable_slots(&self, gap: usize) -> usize {
        self.subkeys
            .keys()
            .filter(|name| is_slot_name(name))
            .filter(|name| {
                // only the canonical spelling of a slot below the gap is read
                name[SLOT_PREFIX.len()..]
                    .parse::<usize>()
                    .map_or(true, |n| n >= gap || **name != slot_name(n))
            })
            .count()
    }

    /// Replace the configuration held in this tree.
    ///
    /// Every existing slot is removed first, so slots beyond the new count
    /// (or beyond a gap) cannot resurface. Unrelated values are kept.
    pub fn store_configuration(&mut self, config: &Configuration) {
        self.subkeys.retain(|name, _| !is_slot_name(name));
        self.set_value(INTERVAL_VALUE, config.poll_interval_seconds.to_string());

        for (index, target) in config.targets.iter().enumerate() {
            let mut slot = Values::new();
            slot.insert(DEVICE_ID_VALUE.to_string(), target.device_id.clone());
            slot.insert(DEVICE_NAME_VALUE.to_string(), target.device_name.clone());
            slot.insert(VOLUME_VALUE.to_string(), target.volume.to_string());
            self.set_subkey(slot_name(index), slot);
        }
    }
}

fn decode_target(slot: &Values) -> Option<Target> {
    let device_id = slot.get(DEVICE_ID_VALUE).filter(|id| !id.is_empty())?;
    let volume = slot.get(VOLUME_VALUE)?.trim().parse::<i32>().ok()?;
    let device_name = slot.get(DEVICE_NAME_VALUE).cloned().unwrap_or_default();

    Some(Target {
        device_id: device_id.clone(),
        device_name,
        volume,
    })
}
