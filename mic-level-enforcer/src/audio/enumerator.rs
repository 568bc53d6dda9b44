//! Device gateway backed by the Windows MMDevice API.
//!
//! Provides COM initialization and the [`WindowsGateway`] used by the
//! scheduler thread and the options dialog.

use super::device::{AudioError, CaptureDevice, DeviceId, DeviceReading, DeviceState, DeviceType};
use super::gateway::DeviceGateway;
use super::volume::VolumeController;
use windows::core::Interface;
use windows::Win32::Devices::Properties::DEVPKEY_Device_FriendlyName;
use windows::Win32::Media::Audio::{
    eAll, eCapture, eRender, IMMDevice, IMMDeviceEnumerator, IMMEndpoint, MMDeviceEnumerator,
    DEVICE_STATE_ACTIVE,
};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoUninitialize, CLSCTX_ALL, COINIT_APARTMENTTHREADED, STGM,
};
use windows::Win32::UI::Shell::PropertiesSystem::{IPropertyStore, PROPERTYKEY};

/// COM initialization guard that uninitializes COM on drop.
pub struct ComGuard {
    initialized: bool,
}

impl ComGuard {
    /// Initialize COM for the current thread.
    pub fn new() -> Result<Self, AudioError> {
        unsafe {
            // Use apartment-threaded for UI compatibility
            CoInitializeEx(None, COINIT_APARTMENTTHREADED)
                .ok()
                .map_err(AudioError::ComInitFailed)?;
        }
        Ok(Self { initialized: true })
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        if self.initialized {
            unsafe {
                CoUninitialize();
            }
        }
    }
}

/// Gateway over `IMMDeviceEnumerator`.
///
/// COM objects are thread-affine: create one per thread, after a
/// [`ComGuard`] for that thread.
pub struct WindowsGateway {
    enumerator: IMMDeviceEnumerator,
    // dropped after the enumerator
    _com: Option<ComGuard>,
}

impl WindowsGateway {
    /// Create a new gateway.
    ///
    /// Note: COM must be initialized before calling this function.
    pub fn new() -> Result<Self, AudioError> {
        unsafe {
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                    .map_err(AudioError::EnumerationFailed)?;

            Ok(Self {
                enumerator,
                _com: None,
            })
        }
    }

    /// Initialize COM on the current thread and create a gateway that
    /// keeps it initialized for as long as the gateway lives.
    pub fn for_current_thread() -> Result<Self, AudioError> {
        let com = ComGuard::new()?;
        let mut gateway = Self::new()?;
        gateway._com = Some(com);
        Ok(gateway)
    }

    /// All active endpoints of both flows, paired with their parsed id.
    ///
    /// Endpoints whose id string does not end in a GUID are ignored.
    fn active_endpoints(&self) -> Result<Vec<(DeviceId, IMMDevice)>, AudioError> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(eAll, DEVICE_STATE_ACTIVE)
                .map_err(AudioError::EnumerationFailed)?;

            let count = collection
                .GetCount()
                .map_err(AudioError::EnumerationFailed)?;

            let mut endpoints = Vec::with_capacity(count as usize);
            for i in 0..count {
                let device = collection.Item(i).map_err(AudioError::EnumerationFailed)?;
                let endpoint_id = Self::endpoint_id(&device)?;
                match DeviceId::from_endpoint_id(&endpoint_id) {
                    Some(id) => endpoints.push((id, device)),
                    None => tracing::debug!(endpoint_id = %endpoint_id, "Skipping endpoint without GUID id"),
                }
            }

            Ok(endpoints)
        }
    }

    fn find_active(&self, id: &DeviceId) -> Result<Option<IMMDevice>, AudioError> {
        Ok(self
            .active_endpoints()?
            .into_iter()
            .find(|(candidate, _)| candidate == id)
            .map(|(_, device)| device))
    }

    fn endpoint_id(device: &IMMDevice) -> Result<String, AudioError> {
        unsafe {
            let id = device.GetId().map_err(AudioError::EnumerationFailed)?;
            id.to_string()
                .map_err(|e| AudioError::StringConversion(e.to_string()))
        }
    }

    fn device_type(device: &IMMDevice) -> Result<DeviceType, AudioError> {
        unsafe {
            let endpoint: IMMEndpoint = device.cast().map_err(AudioError::WindowsError)?;
            let flow = endpoint.GetDataFlow().map_err(AudioError::WindowsError)?;
            Ok(if flow == eCapture {
                DeviceType::Capture
            } else if flow == eRender {
                DeviceType::Render
            } else {
                DeviceType::Other
            })
        }
    }

    fn device_state(device: &IMMDevice) -> Result<DeviceState, AudioError> {
        unsafe {
            let state = device.GetState().map_err(AudioError::WindowsError)?;
            Ok(DeviceState::from_raw(state.0))
        }
    }

    /// Get the friendly name of a device from its property store.
    fn device_name(device: &IMMDevice) -> Option<String> {
        unsafe {
            let props: IPropertyStore = device.OpenPropertyStore(STGM(0)).ok()?;

            // Convert DEVPROPKEY to PROPERTYKEY
            let key = PROPERTYKEY {
                fmtid: DEVPKEY_Device_FriendlyName.fmtid,
                pid: DEVPKEY_Device_FriendlyName.pid,
            };

            let prop = props.GetValue(&key).ok()?;
            let s = prop.to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        }
    }
}

impl DeviceGateway for WindowsGateway {
    fn list_active_capture_devices(&self) -> Result<Vec<CaptureDevice>, AudioError> {
        let mut devices = Vec::new();
        for (id, device) in self.active_endpoints()? {
            if Self::device_type(&device)? != DeviceType::Capture {
                continue;
            }
            let name = Self::device_name(&device).unwrap_or_else(|| "Unknown".to_string());
            devices.push(CaptureDevice { id, name });
        }
        Ok(devices)
    }

    fn get_active_device(&self, id: &DeviceId) -> Result<Option<DeviceReading>, AudioError> {
        let Some(device) = self.find_active(id)? else {
            return Ok(None);
        };

        let volume = VolumeController::new(&device)?;
        Ok(Some(DeviceReading {
            id: *id,
            device_type: Self::device_type(&device)?,
            state: Self::device_state(&device)?,
            volume_percent: volume.get_volume_percent()?,
        }))
    }

    fn set_device_volume(&self, id: &DeviceId, percent: u8) -> Result<(), AudioError> {
        let device = self
            .find_active(id)?
            .ok_or_else(|| AudioError::DeviceNotFound {
                device_id: id.to_string(),
            })?;

        VolumeController::new(&device)?.set_volume_percent(percent)
    }
}
