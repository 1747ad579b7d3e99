//! User preferences stored under the `preferences` key.

pub use crate::domain::{Preferences, Theme, ViewMode};
use crate::storage::{keys, PersistenceService, SaveOptions, StorageBackend, StorageError};

impl Preferences {
    /// Stored preferences, or defaults when none were saved
    pub fn load<B: StorageBackend>(store: &PersistenceService<B>) -> Result<Self, StorageError> {
        Ok(store.load(keys::PREFERENCES, Self::default())?.data)
    }

    pub fn save<B: StorageBackend>(&self, store: &PersistenceService<B>) -> Result<(), StorageError> {
        store.save(keys::PREFERENCES, self, SaveOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Source;
    use crate::storage::MemoryBackend;

    #[test]
    fn test_defaults_when_absent() {
        let store = PersistenceService::new(MemoryBackend::new());
        assert_eq!(Preferences::load(&store).unwrap(), Preferences::default());
    }

    #[test]
    fn test_partial_object_fills_defaults() {
        let store = PersistenceService::new(MemoryBackend::new());
        store
            .save_value(
                keys::PREFERENCES,
                serde_json::json!({"theme": "dark"}),
                SaveOptions::default(),
            )
            .unwrap();

        let prefs = Preferences::load(&store).unwrap();
        assert_eq!(prefs.theme, Theme::Dark);
        assert_eq!(prefs.results_per_page, 20);
    }

    #[test]
    fn test_save_roundtrip() {
        let store = PersistenceService::new(MemoryBackend::new());
        let prefs = Preferences {
            default_source: Source::GoogleBooks,
            view_mode: ViewMode::List,
            ..Default::default()
        };
        prefs.save(&store).unwrap();

        assert_eq!(Preferences::load(&store).unwrap(), prefs);
    }
}
