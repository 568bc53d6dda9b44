//! Application state and lifecycle management.
//!
//! [`AppState`] ties the configuration store, the shared snapshot and the
//! scheduler together. The tray shell and the options dialog drive it.

use crate::audio::{AudioError, CaptureDevice, DeviceGateway};
use crate::config::{Configuration, ConfigStore, EditSession, SettingsBackend, SharedConfig, StoreError};
use crate::scheduler::{Scheduler, SchedulerError};
use std::sync::Arc;
use tracing::{info, warn};

/// Main application state.
pub struct AppState<B> {
    store: ConfigStore<B>,
    config: SharedConfig,
    scheduler: Scheduler,

    /// Whether the application should exit
    pub should_exit: bool,
}

impl<B: SettingsBackend> AppState<B> {
    /// Load the stored configuration and prepare a stopped scheduler.
    ///
    /// An unreadable store is logged and the defaults are used instead.
    pub fn new(store: ConfigStore<B>) -> Self {
        let initial = store.load().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load configuration, using defaults");
            Configuration::default()
        });

        let scheduler_interval = initial.poll_interval();
        let config = SharedConfig::new(initial);
        let scheduler = Scheduler::new(config.clone(), scheduler_interval);

        Self {
            store,
            config,
            scheduler,
            should_exit: false,
        }
    }

    /// Start periodic enforcement with a gateway built on the scheduler thread.
    pub fn start_enforcing<G, F>(&mut self, make_gateway: F) -> Result<(), SchedulerError>
    where
        G: DeviceGateway + 'static,
        F: FnOnce() -> Result<G, AudioError> + Send + 'static,
    {
        self.scheduler.start(make_gateway)
    }

    /// The configuration currently enforced.
    pub fn config(&self) -> Arc<Configuration> {
        self.config.snapshot()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn settings_location(&self) -> String {
        self.store.backend().location()
    }

    /// Start editing a copy of the current configuration.
    pub fn begin_edit(&self) -> EditSession {
        EditSession::begin(&self.config.snapshot())
    }

    /// Persist an edit session and hand the reloaded configuration to the
    /// scheduler. On failure the enforced configuration is unchanged.
    pub fn commit_edit(&mut self, session: EditSession) -> Result<(), StoreError> {
        let fresh = session.commit(&self.store)?;
        let interval = fresh.poll_interval();

        info!(
            targets = fresh.targets.len(),
            poll_interval_seconds = fresh.poll_interval_seconds,
            "Applying new configuration"
        );
        self.config.replace(fresh);
        self.scheduler.set_interval(interval);
        Ok(())
    }

    /// Stop the scheduler and mark the application for exit.
    pub fn request_exit(&mut self) {
        self.scheduler.shutdown();
        self.should_exit = true;
    }
}

/// Active capture devices for the device picker, sorted by name.
pub fn device_choices<G: DeviceGateway + ?Sized>(gateway: &G) -> Result<Vec<CaptureDevice>, AudioError> {
    let mut devices = gateway.list_active_capture_devices()?;
    devices.sort_by_cached_key(|device| device.name.to_lowercase());
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{DeviceId, MemoryGateway, SimulatedDevice};
    use crate::config::tree::SettingsTree;
    use crate::config::{MemoryBackend, Target};
    use crate::scheduler::SchedulerState;
    use std::time::Duration;

    const MIC_X: &str = "8c9d1f0e-2b3a-4c5d-9e8f-0a1b2c3d4e5f";
    const MIC_Y: &str = "11111111-2222-3333-4444-555555555555";

    struct UnreadableBackend;

    impl SettingsBackend for UnreadableBackend {
        fn read_tree(&self) -> Result<Option<SettingsTree>, StoreError> {
            Err(StoreError::RegistryAccess("denied".to_string()))
        }

        fn write_tree(&self, _tree: &SettingsTree) -> Result<(), StoreError> {
            Err(StoreError::RegistryWrite {
                key: "Mic0".to_string(),
            })
        }

        fn location(&self) -> String {
            "unreadable".to_string()
        }
    }

    /// Saves succeed; reading back after a save fails.
    #[derive(Default)]
    struct ForgetfulBackend {
        saved: std::sync::atomic::AtomicBool,
    }

    impl SettingsBackend for ForgetfulBackend {
        fn read_tree(&self) -> Result<Option<SettingsTree>, StoreError> {
            if self.saved.load(std::sync::atomic::Ordering::SeqCst) {
                Err(StoreError::RegistryAccess("denied".to_string()))
            } else {
                Ok(None)
            }
        }

        fn write_tree(&self, _tree: &SettingsTree) -> Result<(), StoreError> {
            self.saved.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }

        fn location(&self) -> String {
            "forgetful".to_string()
        }
    }

    fn stored(config: &Configuration) -> ConfigStore<MemoryBackend> {
        let store = ConfigStore::new(MemoryBackend::new());
        store.save(config).unwrap();
        store
    }

    #[test]
    fn test_new_loads_stored_configuration() {
        let mut config = Configuration::default();
        config.upsert_target(MIC_X, "X", 40);
        config.poll_interval_seconds = 15;

        let app = AppState::new(stored(&config));
        assert_eq!(*app.config(), config);
        assert_eq!(app.scheduler().interval(), Duration::from_secs(15));
        assert_eq!(app.scheduler().state(), SchedulerState::Stopped);
    }

    #[test]
    fn test_unreadable_store_falls_back_to_defaults() {
        let app = AppState::new(ConfigStore::new(UnreadableBackend));
        assert_eq!(*app.config(), Configuration::default());
    }

    #[test]
    fn test_commit_replaces_snapshot_and_interval() {
        let mut app = AppState::new(ConfigStore::new(MemoryBackend::new()));
        let before = app.config();

        let mut session = app.begin_edit();
        session.add_or_update(MIC_X, "X", 75);
        session.set_poll_interval_seconds(30);
        app.commit_edit(session).unwrap();

        assert!(before.targets.is_empty());
        assert_eq!(app.config().targets, vec![Target::new(MIC_X, "X", 75)]);
        assert_eq!(app.scheduler().interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_failed_commit_keeps_enforced_configuration() {
        let mut app = AppState::new(ConfigStore::new(UnreadableBackend));
        let mut session = app.begin_edit();
        session.add_or_update(MIC_X, "X", 75);

        assert!(app.commit_edit(session).is_err());
        assert!(app.config().targets.is_empty());
    }

    #[test]
    fn test_commit_applies_saved_edits_when_reload_fails() {
        let mut app = AppState::new(ConfigStore::new(ForgetfulBackend::default()));
        let mut session = app.begin_edit();
        session.add_or_update(MIC_X, "X", 75);
        session.set_poll_interval_seconds(45);

        app.commit_edit(session).unwrap();
        assert_eq!(app.config().targets, vec![Target::new(MIC_X, "X", 75)]);
        assert_eq!(app.scheduler().interval(), Duration::from_secs(45));
    }

    #[test]
    fn test_request_exit_stops_scheduler() {
        let mut app = AppState::new(ConfigStore::new(MemoryBackend::new()));
        app.start_enforcing(|| Ok(MemoryGateway::default())).unwrap();
        assert_eq!(app.scheduler().state(), SchedulerState::Running);

        app.request_exit();
        assert!(app.should_exit);
        assert_eq!(app.scheduler().state(), SchedulerState::Stopped);
    }

    #[test]
    fn test_device_choices_sorted_by_name() {
        let gateway = MemoryGateway::new(vec![
            SimulatedDevice::microphone(MIC_X.parse::<DeviceId>().unwrap(), "USB Mic", 50.0),
            SimulatedDevice::microphone(MIC_Y.parse::<DeviceId>().unwrap(), "array mic", 50.0),
        ]);

        let names: Vec<_> = device_choices(&gateway)
            .unwrap()
            .into_iter()
            .map(|device| device.name)
            .collect();
        assert_eq!(names, vec!["array mic", "USB Mic"]);
    }
}
