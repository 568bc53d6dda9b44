//! Volume control using IAudioEndpointVolume.

use super::device::AudioError;
use windows::Win32::Media::Audio::{Endpoints::IAudioEndpointVolume, IMMDevice};
use windows::Win32::System::Com::CLSCTX_ALL;

/// Master volume control for a specific endpoint.
pub struct VolumeController {
    endpoint_volume: IAudioEndpointVolume,
}

impl VolumeController {
    /// Create a new VolumeController for the given device.
    pub fn new(device: &IMMDevice) -> Result<Self, AudioError> {
        unsafe {
            let endpoint_volume: IAudioEndpointVolume = device
                .Activate(CLSCTX_ALL, None)
                .map_err(|_| AudioError::VolumeNotAvailable)?;

            Ok(Self { endpoint_volume })
        }
    }

    /// Get the current volume as a percentage (0.0 to 100.0).
    pub fn get_volume_percent(&self) -> Result<f64, AudioError> {
        unsafe {
            let level = self
                .endpoint_volume
                .GetMasterVolumeLevelScalar()
                .map_err(AudioError::WindowsError)?;
            Ok(f64::from(level) * 100.0)
        }
    }

    /// Set the volume in whole percent.
    pub fn set_volume_percent(&self, percent: u8) -> Result<(), AudioError> {
        let level = (f32::from(percent) / 100.0).clamp(0.0, 1.0);
        unsafe {
            self.endpoint_volume
                .SetMasterVolumeLevelScalar(level, std::ptr::null())
                .map_err(AudioError::WindowsError)?;
            Ok(())
        }
    }
}
