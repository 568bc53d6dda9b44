//! Configuration data model.

use std::fmt;
use std::time::Duration;

/// Lowest poll interval accepted, in seconds.
pub const MIN_POLL_INTERVAL_SECS: u32 = 5;

/// Highest poll interval accepted, in seconds.
pub const MAX_POLL_INTERVAL_SECS: u32 = 3600;

/// Poll interval used when nothing valid is persisted.
pub const DEFAULT_POLL_INTERVAL_SECS: u32 = 60;

/// Longest device name shown before truncation in list labels.
const LABEL_MAX_CHARS: usize = 20;

/// Clamp a configured volume into the 0..=100 percent domain.
pub fn clamp_volume(volume: i32) -> u8 {
    volume.clamp(0, 100) as u8
}

/// Clamp a poll interval into its accepted domain.
pub fn clamp_poll_interval(seconds: i64) -> u32 {
    seconds.clamp(
        i64::from(MIN_POLL_INTERVAL_SECS),
        i64::from(MAX_POLL_INTERVAL_SECS),
    ) as u32
}

/// One configured (device, desired volume) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Canonical device id string, parsed only when enforcing
    pub device_id: String,

    /// Last-known display name. Never used for matching.
    pub device_name: String,

    /// Desired volume, nominally 0..=100
    pub volume: i32,
}

impl Target {
    pub fn new(device_id: impl Into<String>, device_name: impl Into<String>, volume: i32) -> Self {
        Self {
            device_id: device_id.into(),
            device_name: device_name.into(),
            volume,
        }
    }

    /// Short label for list display. Falls back to the id for blank names.
    pub fn display_name(&self) -> String {
        let name = self.device_name.trim();
        if name.is_empty() {
            return self.device_id.clone();
        }

        if name.chars().count() <= LABEL_MAX_CHARS {
            name.to_string()
        } else {
            let head: String = name.chars().take(LABEL_MAX_CHARS - 3).collect();
            format!("{}...", head)
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DeviceName: {}, Volume: {}%",
            self.display_name(),
            self.volume
        )
    }
}

/// Whether an upsert appended a new target or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Added,
    Updated,
}

/// The full persisted configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    /// Targets in insertion order
    pub targets: Vec<Target>,

    /// Seconds between enforcement passes
    pub poll_interval_seconds: u32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            poll_interval_seconds: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl Configuration {
    /// Poll interval as a duration, clamped into the accepted domain.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(u64::from(clamp_poll_interval(i64::from(
            self.poll_interval_seconds,
        ))))
    }

    /// Find a target by device id.
    pub fn target(&self, device_id: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.device_id == device_id)
    }

    /// Replace the target with this id in place, or append a new one.
    pub fn upsert_target(&mut self, device_id: &str, device_name: &str, volume: i32) -> Upsert {
        match self.targets.iter_mut().find(|t| t.device_id == device_id) {
            Some(existing) => {
                existing.device_name = device_name.to_string();
                existing.volume = volume;
                Upsert::Updated
            }
            None => {
                self.targets.push(Target::new(device_id, device_name, volume));
                Upsert::Added
            }
        }
    }

    /// Remove the target equal to `target` in every field.
    pub fn remove_target(&mut self, target: &Target) -> bool {
        match self.targets.iter().position(|t| t == target) {
            Some(index) => {
                self.targets.remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove the target with this device id. Missing ids are a no-op.
    pub fn remove_target_by_id(&mut self, device_id: &str) -> bool {
        match self.targets.iter().position(|t| t.device_id == device_id) {
            Some(index) => {
                self.targets.remove(index);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Configuration {
        Configuration {
            targets: vec![
                Target::new("a", "Mic A", 10),
                Target::new("b", "Mic B", 20),
                Target::new("c", "Mic C", 30),
            ],
            poll_interval_seconds: 60,
        }
    }

    #[test]
    fn test_clamp_volume() {
        assert_eq!(clamp_volume(-5), 0);
        assert_eq!(clamp_volume(0), 0);
        assert_eq!(clamp_volume(55), 55);
        assert_eq!(clamp_volume(100), 100);
        assert_eq!(clamp_volume(250), 100);
    }

    #[test]
    fn test_clamp_poll_interval() {
        assert_eq!(clamp_poll_interval(0), 5);
        assert_eq!(clamp_poll_interval(-30), 5);
        assert_eq!(clamp_poll_interval(60), 60);
        assert_eq!(clamp_poll_interval(99_999), 3600);
    }

    #[test]
    fn test_default_configuration() {
        let config = Configuration::default();
        assert!(config.targets.is_empty());
        assert_eq!(config.poll_interval_seconds, 60);
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_upsert_existing_preserves_position() {
        let mut config = sample();
        let outcome = config.upsert_target("b", "Renamed", 99);

        assert_eq!(outcome, Upsert::Updated);
        assert_eq!(config.targets.len(), 3);
        assert_eq!(config.targets[1], Target::new("b", "Renamed", 99));
    }

    #[test]
    fn test_upsert_new_appends() {
        let mut config = sample();
        let outcome = config.upsert_target("d", "Mic D", 40);

        assert_eq!(outcome, Upsert::Added);
        assert_eq!(config.targets.last(), Some(&Target::new("d", "Mic D", 40)));
    }

    #[test]
    fn test_remove_by_id() {
        let mut config = sample();
        assert!(config.remove_target_by_id("b"));
        let ids: Vec<_> = config.targets.iter().map(|t| t.device_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);

        let before = config.clone();
        assert!(!config.remove_target_by_id("missing"));
        assert_eq!(config, before);
    }

    #[test]
    fn test_remove_requires_full_equality() {
        let mut config = sample();
        assert!(!config.remove_target(&Target::new("a", "Mic A", 11)));
        assert!(config.remove_target(&Target::new("a", "Mic A", 10)));
        assert_eq!(config.targets.len(), 2);
    }

    #[test]
    fn test_display_name_truncates_and_falls_back() {
        let long = Target::new("id-1", "A very long microphone name", 50);
        assert_eq!(long.display_name(), "A very long micro...");

        let blank = Target::new("id-2", "  ", 50);
        assert_eq!(blank.display_name(), "id-2");

        assert_eq!(
            Target::new("id-3", "Desk Mic", 80).to_string(),
            "DeviceName: Desk Mic, Volume: 80%"
        );
    }
}
