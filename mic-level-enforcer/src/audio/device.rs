//! Audio device data models.
//!
//! Defines the identifiers and live readings the reconciliation engine
//! works with, plus the gateway error type.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Stable identifier of an audio endpoint.
///
/// Persisted in its canonical string form (lower-case hyphenated GUID).
/// Parsing also accepts the braced and simple GUID forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(Uuid);

impl DeviceId {
    /// Wrap an existing GUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Extract the GUID part of a Windows endpoint id string such as
    /// `{0.0.1.00000000}.{8c9d1f0e-...}`.
    pub fn from_endpoint_id(endpoint_id: &str) -> Option<Self> {
        let guid = endpoint_id.rsplit('.').next()?;
        guid.parse().ok()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for DeviceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Data flow direction of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    /// Microphones and other recording endpoints
    Capture,

    /// Speakers, headphones
    Render,

    /// Anything the OS reports that is neither
    Other,
}

/// Windows device state flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Device is active and available for use
    Active,

    /// Device is disabled in Windows Sound settings
    Disabled,

    /// Device is not present (driver issue)
    NotPresent,

    /// Device is unplugged (for pluggable devices)
    Unplugged,
}

impl DeviceState {
    /// Map a raw `DEVICE_STATE_*` bit to a state.
    pub fn from_raw(state: u32) -> Self {
        match state {
            1 => DeviceState::Active,
            2 => DeviceState::Disabled,
            8 => DeviceState::Unplugged,
            _ => DeviceState::NotPresent,
        }
    }
}

/// An active capture device as offered to the configuration dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureDevice {
    pub id: DeviceId,

    /// Human-readable device name (from device properties)
    pub name: String,
}

/// Live state of a single endpoint. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceReading {
    pub id: DeviceId,
    pub device_type: DeviceType,
    pub state: DeviceState,

    /// Master volume as percentage (0.0 to 100.0)
    pub volume_percent: f64,
}

impl DeviceReading {
    /// True for an active capture endpoint, the only kind we ever correct.
    pub fn is_active_capture(&self) -> bool {
        self.device_type == DeviceType::Capture && self.state == DeviceState::Active
    }
}

/// Audio gateway error types.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: String },

    #[error("Volume control not available for device")]
    VolumeNotAvailable,

    #[error("Device gateway failure: {0}")]
    Gateway(String),

    #[cfg(windows)]
    #[error("COM initialization failed: {0}")]
    ComInitFailed(#[source] windows::core::Error),

    #[cfg(windows)]
    #[error("Failed to enumerate devices: {0}")]
    EnumerationFailed(#[source] windows::core::Error),

    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    WindowsError(#[source] windows::core::Error),

    #[error("String conversion error: {0}")]
    StringConversion(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_round_trips_canonical_form() {
        let text = "8c9d1f0e-2b3a-4c5d-9e8f-0a1b2c3d4e5f";
        let id: DeviceId = text.parse().unwrap();
        assert_eq!(id.to_string(), text);
    }

    #[test]
    fn test_device_id_accepts_braced_upper_case() {
        let id: DeviceId = "{8C9D1F0E-2B3A-4C5D-9E8F-0A1B2C3D4E5F}".parse().unwrap();
        assert_eq!(id.to_string(), "8c9d1f0e-2b3a-4c5d-9e8f-0a1b2c3d4e5f");
    }

    #[test]
    fn test_device_id_rejects_garbage() {
        assert!("not-a-guid".parse::<DeviceId>().is_err());
        assert!("".parse::<DeviceId>().is_err());
    }

    #[test]
    fn test_device_id_from_endpoint_id() {
        let id = DeviceId::from_endpoint_id("{0.0.1.00000000}.{8c9d1f0e-2b3a-4c5d-9e8f-0a1b2c3d4e5f}")
            .unwrap();
        assert_eq!(id.to_string(), "8c9d1f0e-2b3a-4c5d-9e8f-0a1b2c3d4e5f");
        assert!(DeviceId::from_endpoint_id("{0.0.1.00000000}").is_none());
    }

    #[test]
    fn test_device_state_from_raw() {
        assert_eq!(DeviceState::from_raw(1), DeviceState::Active);
        assert_eq!(DeviceState::from_raw(2), DeviceState::Disabled);
        assert_eq!(DeviceState::from_raw(4), DeviceState::NotPresent);
        assert_eq!(DeviceState::from_raw(8), DeviceState::Unplugged);
    }
}
