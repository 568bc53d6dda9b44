//! Audio module for device access.
//!
//! Exposes the device gateway abstraction, its in-memory implementation
//! and, on Windows, the Core Audio implementation.

pub mod device;
pub mod gateway;

#[cfg(windows)]
pub mod enumerator;
#[cfg(windows)]
pub mod volume;

pub use device::{AudioError, CaptureDevice, DeviceId, DeviceReading, DeviceState, DeviceType};
pub use gateway::{DeviceGateway, MemoryGateway, SimulatedDevice};

#[cfg(windows)]
pub use enumerator::{ComGuard, WindowsGateway};
