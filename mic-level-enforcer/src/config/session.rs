//! Configuration editing session.
//!
//! The options dialog edits a private draft. Nothing is visible to the
//! scheduler until [`EditSession::commit`] saves it and reloads a fresh
//! snapshot.

use super::model::{clamp_poll_interval, Configuration, Target, Upsert};
use super::store::{ConfigStore, SettingsBackend, StoreError};
use tracing::{debug, warn};

/// A pending set of edits over a copy of the configuration.
#[derive(Debug, Clone)]
pub struct EditSession {
    draft: Configuration,
}

impl EditSession {
    /// Begin editing a copy of `current`.
    pub fn begin(current: &Configuration) -> Self {
        Self {
            draft: current.clone(),
        }
    }

    pub fn targets(&self) -> &[Target] {
        &self.draft.targets
    }

    pub fn poll_interval_seconds(&self) -> u32 {
        self.draft.poll_interval_seconds
    }

    /// Set the poll interval, clamped into its accepted range.
    pub fn set_poll_interval_seconds(&mut self, seconds: u32) {
        self.draft.poll_interval_seconds = clamp_poll_interval(i64::from(seconds));
    }

    /// Add a target, or replace the name and volume of the one with this id.
    pub fn add_or_update(&mut self, device_id: &str, device_name: &str, volume: i32) -> Upsert {
        let outcome = self.draft.upsert_target(device_id, device_name, volume);
        debug!(device_id, volume, ?outcome, "Edited target");
        outcome
    }

    /// The draft's target for this device id, if any.
    pub fn target(&self, device_id: &str) -> Option<&Target> {
        self.draft.target(device_id)
    }

    /// Remove the target equal to `target`.
    pub fn remove(&mut self, target: &Target) -> bool {
        self.draft.remove_target(target)
    }

    /// Remove the target with this device id.
    pub fn remove_by_id(&mut self, device_id: &str) -> bool {
        self.draft.remove_target_by_id(device_id)
    }

    /// Save the draft once and return the freshly loaded configuration.
    ///
    /// Only a failed save is an error. If the store cannot be read back
    /// afterwards, the saved draft is returned instead.
    pub fn commit<B: SettingsBackend>(self, store: &ConfigStore<B>) -> Result<Configuration, StoreError> {
        store.save(&self.draft)?;
        match store.load() {
            Ok(fresh) => Ok(fresh),
            Err(e) => {
                warn!(error = %e, "Saved configuration could not be reloaded, using the saved draft");
                Ok(self.draft)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::store::MemoryBackend;
    use crate::config::tree::SettingsTree;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Accepts writes, then refuses every read after the first one.
    #[derive(Default)]
    struct WriteOnlyBackend {
        inner: MemoryBackend,
        written: AtomicBool,
    }

    impl SettingsBackend for WriteOnlyBackend {
        fn read_tree(&self) -> Result<Option<SettingsTree>, StoreError> {
            if self.written.load(Ordering::SeqCst) {
                return Err(StoreError::RegistryAccess("read denied".to_string()));
            }
            self.inner.read_tree()
        }

        fn write_tree(&self, tree: &SettingsTree) -> Result<(), StoreError> {
            self.inner.write_tree(tree)?;
            self.written.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn location(&self) -> String {
            "write-only".to_string()
        }
    }

    #[test]
    fn test_edits_do_not_touch_original() {
        let original = Configuration::default();
        let mut session = EditSession::begin(&original);
        session.add_or_update("a", "A", 50);

        assert!(original.targets.is_empty());
        assert_eq!(session.targets().len(), 1);
    }

    #[test]
    fn test_add_or_update_semantics() {
        let mut session = EditSession::begin(&Configuration::default());
        assert_eq!(session.add_or_update("a", "A", 10), Upsert::Added);
        assert_eq!(session.add_or_update("b", "B", 20), Upsert::Added);
        assert_eq!(session.add_or_update("a", "A (USB)", 90), Upsert::Updated);

        assert_eq!(
            session.targets(),
            &[Target::new("a", "A (USB)", 90), Target::new("b", "B", 20)]
        );
    }

    #[test]
    fn test_remove_by_id_and_identity() {
        let mut session = EditSession::begin(&Configuration::default());
        session.add_or_update("a", "A", 10);
        session.add_or_update("b", "B", 20);

        assert!(!session.remove_by_id("zzz"));
        assert!(session.remove(&Target::new("b", "B", 20)));
        assert_eq!(session.targets(), &[Target::new("a", "A", 10)]);
    }

    #[test]
    fn test_target_lookup_sees_draft_edits() {
        let mut session = EditSession::begin(&Configuration::default());
        assert!(session.target("a").is_none());

        session.add_or_update("a", "A", 10);
        session.add_or_update("a", "A", 65);
        assert_eq!(session.target("a").map(|t| t.volume), Some(65));
    }

    #[test]
    fn test_interval_is_clamped() {
        let mut session = EditSession::begin(&Configuration::default());
        session.set_poll_interval_seconds(1);
        assert_eq!(session.poll_interval_seconds(), 5);
        session.set_poll_interval_seconds(10_000);
        assert_eq!(session.poll_interval_seconds(), 3600);
    }

    #[test]
    fn test_commit_saves_and_reloads() {
        let store = ConfigStore::new(MemoryBackend::new());
        let mut session = EditSession::begin(&store.load().unwrap());
        session.add_or_update("a", "A", 70);
        session.set_poll_interval_seconds(10);

        let committed = session.commit(&store).unwrap();
        assert_eq!(committed.targets, vec![Target::new("a", "A", 70)]);
        assert_eq!(committed.poll_interval_seconds, 10);
        assert_eq!(store.load().unwrap(), committed);
    }

    #[test]
    fn test_commit_survives_failed_reload() {
        let store = ConfigStore::new(WriteOnlyBackend::default());
        let mut session = EditSession::begin(&Configuration::default());
        session.add_or_update("a", "A", 70);
        session.set_poll_interval_seconds(20);

        let committed = session.commit(&store).unwrap();
        assert_eq!(committed.targets, vec![Target::new("a", "A", 70)]);
        assert_eq!(committed.poll_interval_seconds, 20);
        assert!(store.backend().inner.tree().is_some());
    }
}
