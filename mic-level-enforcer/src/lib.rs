//! Microphone Level Enforcer - Library
//!
//! A system tray utility that keeps microphone input volumes at the levels
//! the user configured.
//!
//! ## Features
//!
//! - Periodic enforcement pass over every configured capture device
//! - Configuration persisted in the registry or a TOML settings file
//! - Options dialog to add, update and remove per-device targets
//! - Adjustable check interval, applied without a restart

pub mod app;
pub mod audio;
pub mod config;
pub mod engine;
pub mod platform;
pub mod scheduler;
#[cfg(windows)]
pub mod ui;

pub use app::AppState;
pub use audio::{AudioError, CaptureDevice, DeviceGateway, DeviceId, MemoryGateway};
pub use config::{ConfigStore, Configuration, EditSession, SettingsBackend, StoreError, Target};
pub use engine::{enforce, EnforcementReport, TargetOutcome};
pub use scheduler::{Scheduler, SchedulerError, SchedulerState};
