//! Durable preferences: last selected devices and application settings.
//!
//! Scalar preferences are trimmed, non-empty strings. A value that fails that
//! check is rejected before anything is written. A stored value that fails it
//! on read is logged and treated as unset.

mod settings;
mod store;

use std::sync::{Arc, Mutex, PoisonError};

pub use settings::{parse_settings, AppSettings, SettingsPatch};
pub use store::{JsonFileBackend, MemoryBackend, StorageBackend};

use crate::error::{OrchestratorError, Result};
use crate::schema::{non_empty_trimmed, FieldPath};

/// Storage key of the settings record.
pub const SETTINGS_KEY: &str = "settings";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreferenceKey {
    LastSelectedAppPid,
    LastSelectedMicId,
}

impl PreferenceKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreferenceKey::LastSelectedAppPid => "lastSelectedAppPid",
            PreferenceKey::LastSelectedMicId => "lastSelectedMicId",
        }
    }
}

impl std::fmt::Display for PreferenceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct PreferenceStore {
    backend: Arc<dyn StorageBackend>,
    /// Serializes read-merge-write of the settings record.
    settings_lock: Arc<Mutex<()>>,
}

impl PreferenceStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            settings_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Stored value for `key`, or `None` when unset or corrupt.
    pub fn load(&self, key: PreferenceKey) -> Option<String> {
        let raw = self.backend.get(key.as_str())?;
        match non_empty_trimmed(&raw, &FieldPath::root().field(key.as_str())) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Preferences: stored {} is corrupt ({}), treating as unset", key, e);
                None
            }
        }
    }

    /// Validate and persist. Returns the stored (trimmed) value.
    pub fn save(&self, key: PreferenceKey, value: &str) -> Result<String> {
        let validated = non_empty_trimmed(value, &FieldPath::root().field(key.as_str()))?;
        self.backend
            .set(key.as_str(), &validated)
            .map_err(OrchestratorError::Storage)?;
        log::debug!("Preferences: saved {}", key);
        Ok(validated)
    }

    /// Stored settings, or defaults when unset or corrupt.
    pub fn load_settings(&self) -> AppSettings {
        let Some(raw) = self.backend.get(SETTINGS_KEY) else {
            return AppSettings::default();
        };
        match parse_settings(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Preferences: stored settings are corrupt ({}), using defaults", e);
                AppSettings::default()
            }
        }
    }

    /// Replace the settings record.
    pub fn save_settings(&self, next: AppSettings) -> Result<AppSettings> {
        let _guard = self.settings_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.write_settings(next.normalized())
    }

    /// Merge `patch` into the stored record and persist the result in one write.
    pub fn update_settings(&self, patch: SettingsPatch) -> Result<AppSettings> {
        let _guard = self.settings_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let merged = self.load_settings().merged(patch);
        self.write_settings(merged)
    }

    fn write_settings(&self, settings: AppSettings) -> Result<AppSettings> {
        let contents = serde_json::to_string(&settings)
            .map_err(|e| OrchestratorError::Storage(format!("Serialize settings: {}", e)))?;
        self.backend
            .set(SETTINGS_KEY, &contents)
            .map_err(OrchestratorError::Storage)?;
        log::info!(
            "Preferences: settings saved (gemini key configured: {})",
            settings.has_gemini_api_key()
        );
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_preference_loads_as_none() {
        let store = PreferenceStore::in_memory();
        assert_eq!(store.load(PreferenceKey::LastSelectedAppPid), None);
    }

    #[test]
    fn save_trims_before_writing() {
        let store = PreferenceStore::in_memory();
        assert_eq!(store.save(PreferenceKey::LastSelectedMicId, "  mic-1 ").unwrap(), "mic-1");
        assert_eq!(store.load(PreferenceKey::LastSelectedMicId).as_deref(), Some("mic-1"));
    }

    #[test]
    fn empty_save_is_rejected_and_keeps_prior_value() {
        let store = PreferenceStore::in_memory();
        store.save(PreferenceKey::LastSelectedAppPid, "10").unwrap();

        for bad in ["", "   ", "\t\n"] {
            let err = store.save(PreferenceKey::LastSelectedAppPid, bad).unwrap_err();
            assert!(matches!(err, OrchestratorError::Validation(_)));
        }
        assert_eq!(store.load(PreferenceKey::LastSelectedAppPid).as_deref(), Some("10"));
    }

    #[test]
    fn corrupt_stored_value_reads_as_unset() {
        let backend = MemoryBackend::new().with_entry("lastSelectedAppPid", "   ");
        let store = PreferenceStore::new(Arc::new(backend));
        assert_eq!(store.load(PreferenceKey::LastSelectedAppPid), None);
    }

    #[test]
    fn corrupt_settings_fall_back_to_defaults() {
        let backend = MemoryBackend::new().with_entry(SETTINGS_KEY, "{\"geminiApiKey\": [1]}");
        let store = PreferenceStore::new(Arc::new(backend));
        assert_eq!(store.load_settings(), AppSettings::default());
    }

    #[test]
    fn update_settings_merges_with_stored_record() {
        let store = PreferenceStore::in_memory();
        store
            .save_settings(AppSettings {
                gemini_api_key: " key-a ".into(),
            })
            .unwrap();
        assert_eq!(store.load_settings().gemini_api_key, "key-a");

        let unchanged = store.update_settings(SettingsPatch::default()).unwrap();
        assert_eq!(unchanged.gemini_api_key, "key-a");

        let updated = store
            .update_settings(SettingsPatch {
                gemini_api_key: Some("key-b".into()),
            })
            .unwrap();
        assert_eq!(updated, store.load_settings());
        assert_eq!(updated.gemini_api_key, "key-b");
    }

    #[test]
    fn file_backed_preferences_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        {
            let store = PreferenceStore::new(Arc::new(JsonFileBackend::open(&path)));
            store.save(PreferenceKey::LastSelectedAppPid, "10").unwrap();
            store
                .update_settings(SettingsPatch {
                    gemini_api_key: Some("secret".into()),
                })
                .unwrap();
        }
        let store = PreferenceStore::new(Arc::new(JsonFileBackend::open(&path)));
        assert_eq!(store.load(PreferenceKey::LastSelectedAppPid).as_deref(), Some("10"));
        assert_eq!(store.load_settings().gemini_api_key, "secret");
    }
}
