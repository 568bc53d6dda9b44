//! Device gateway abstraction.
//!
//! The reconciliation engine and the options dialog only talk to the OS
//! audio subsystem through [`DeviceGateway`]. [`MemoryGateway`] is an
//! in-process implementation used by tests.

use super::device::{AudioError, CaptureDevice, DeviceId, DeviceReading, DeviceState, DeviceType};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// List/get/set capability over audio endpoints.
///
/// All calls are synchronous and may block on OS I/O.
pub trait DeviceGateway {
    /// Active capture devices, for the device picker.
    fn list_active_capture_devices(&self) -> Result<Vec<CaptureDevice>, AudioError>;

    /// Look up an endpoint by id among active devices only.
    ///
    /// Returns `Ok(None)` when the device is unplugged, disabled or unknown.
    fn get_active_device(&self, id: &DeviceId) -> Result<Option<DeviceReading>, AudioError>;

    /// Set the master volume of a device, in whole percent (0..=100).
    fn set_device_volume(&self, id: &DeviceId, percent: u8) -> Result<(), AudioError>;
}

impl<G: DeviceGateway + ?Sized> DeviceGateway for &G {
    fn list_active_capture_devices(&self) -> Result<Vec<CaptureDevice>, AudioError> {
        (**self).list_active_capture_devices()
    }

    fn get_active_device(&self, id: &DeviceId) -> Result<Option<DeviceReading>, AudioError> {
        (**self).get_active_device(id)
    }

    fn set_device_volume(&self, id: &DeviceId, percent: u8) -> Result<(), AudioError> {
        (**self).set_device_volume(id, percent)
    }
}

/// A simulated endpoint held by [`MemoryGateway`].
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    pub id: DeviceId,
    pub name: String,
    pub device_type: DeviceType,
    pub state: DeviceState,
    pub volume_percent: f64,
}

impl SimulatedDevice {
    /// An active microphone at the given volume.
    pub fn microphone(id: DeviceId, name: &str, volume_percent: f64) -> Self {
        Self {
            id,
            name: name.to_string(),
            device_type: DeviceType::Capture,
            state: DeviceState::Active,
            volume_percent,
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    devices: Vec<SimulatedDevice>,
    writes: Vec<(DeviceId, u8)>,
    failing: HashSet<DeviceId>,
}

/// In-memory gateway. Records every volume write.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    state: Mutex<MemoryState>,
}

impl MemoryGateway {
    /// Create a gateway holding the given devices.
    pub fn new(devices: Vec<SimulatedDevice>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                devices,
                ..MemoryState::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulate an external volume change (driver, user, another app).
    pub fn set_external_volume(&self, id: &DeviceId, volume_percent: f64) {
        if let Some(device) = self.lock().devices.iter_mut().find(|d| &d.id == id) {
            device.volume_percent = volume_percent;
        }
    }

    /// Change the state of a device, e.g. to simulate unplugging it.
    pub fn set_state(&self, id: &DeviceId, state: DeviceState) {
        if let Some(device) = self.lock().devices.iter_mut().find(|d| &d.id == id) {
            device.state = state;
        }
    }

    /// Make every call touching `id` fail until cleared.
    pub fn fail_device(&self, id: DeviceId) {
        self.lock().failing.insert(id);
    }

    /// Current simulated volume of a device.
    pub fn volume_of(&self, id: &DeviceId) -> Option<f64> {
        self.lock()
            .devices
            .iter()
            .find(|d| &d.id == id)
            .map(|d| d.volume_percent)
    }

    /// All volume writes issued so far, in order.
    pub fn writes(&self) -> Vec<(DeviceId, u8)> {
        self.lock().writes.clone()
    }
}

impl DeviceGateway for MemoryGateway {
    fn list_active_capture_devices(&self) -> Result<Vec<CaptureDevice>, AudioError> {
        Ok(self
            .lock()
            .devices
            .iter()
            .filter(|d| d.device_type == DeviceType::Capture && d.state == DeviceState::Active)
            .map(|d| CaptureDevice {
                id: d.id,
                name: d.name.clone(),
            })
            .collect())
    }

    fn get_active_device(&self, id: &DeviceId) -> Result<Option<DeviceReading>, AudioError> {
        let state = self.lock();
        if state.failing.contains(id) {
            return Err(AudioError::Gateway(format!("simulated failure for {}", id)));
        }

        Ok(state
            .devices
            .iter()
            .find(|d| &d.id == id && d.state == DeviceState::Active)
            .map(|d| DeviceReading {
                id: d.id,
                device_type: d.device_type,
                state: d.state,
                volume_percent: d.volume_percent,
            }))
    }

    fn set_device_volume(&self, id: &DeviceId, percent: u8) -> Result<(), AudioError> {
        let mut state = self.lock();
        if state.failing.contains(id) {
            return Err(AudioError::Gateway(format!("simulated failure for {}", id)));
        }

        let device = state
            .devices
            .iter_mut()
            .find(|d| &d.id == id)
            .ok_or_else(|| AudioError::DeviceNotFound {
                device_id: id.to_string(),
            })?;
        device.volume_percent = f64::from(percent.min(100));
        state.writes.push((*id, percent));
        Ok(())
    }
}
