//! Shared handle to the current configuration snapshot.

use super::model::Configuration;
use std::sync::{Arc, PoisonError, RwLock};

/// The authoritative configuration, shared between the UI and the
/// scheduler.
///
/// Readers take an immutable snapshot; writers swap in a whole new one.
/// A snapshot already handed out is never mutated.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    current: Arc<RwLock<Arc<Configuration>>>,
}

impl SharedConfig {
    pub fn new(config: Configuration) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// The configuration as of now.
    pub fn snapshot(&self) -> Arc<Configuration> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Make `config` authoritative from the next pass onwards.
    pub fn replace(&self, config: Configuration) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_does_not_mutate_existing_snapshot() {
        let shared = SharedConfig::new(Configuration::default());
        let before = shared.snapshot();

        let mut next = Configuration::default();
        next.upsert_target("a", "A", 10);
        shared.replace(next.clone());

        assert!(before.targets.is_empty());
        assert_eq!(*shared.snapshot(), next);
    }
}
