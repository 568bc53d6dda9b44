//! Platform-specific module for Windows utilities.
//!
//! Registry-backed settings storage and tray icon artwork.

pub mod icons;
#[cfg(windows)]
pub mod registry;

#[cfg(windows)]
pub use registry::RegistryBackend;
