//! Orchestrator configuration.
//!
//! Defaults follow the platform directories:
//! - recordings: `~/Downloads/scribo/`
//! - preferences: `<config dir>/scribo/preferences.json`
//!
//! `from_env()` reads a `.env` file if present, then applies the
//! `SCRIBO_*` overrides.

use std::path::PathBuf;
use std::time::Duration;

const APP_DIR: &str = "scribo";
const PREFERENCES_FILE_NAME: &str = "preferences.json";
const DEFAULT_CATALOG_STALE_SECS: u64 = 30;

pub const ENV_RECORDINGS_DIR: &str = "SCRIBO_RECORDINGS_DIR";
pub const ENV_PREFERENCES_PATH: &str = "SCRIBO_PREFERENCES_PATH";
pub const ENV_CATALOG_STALE_SECS: &str = "SCRIBO_CATALOG_STALE_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Where new captures are written.
    pub recordings_dir: PathBuf,
    /// JSON file backing the preference store.
    pub preferences_path: PathBuf,
    /// Age after which the application and device catalogs are refetched.
    pub catalog_stale_after: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        let recordings_root = dirs::download_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        let config_root = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            recordings_dir: recordings_root.join(APP_DIR),
            preferences_path: config_root.join(APP_DIR).join(PREFERENCES_FILE_NAME),
            catalog_stale_after: Duration::from_secs(DEFAULT_CATALOG_STALE_SECS),
        }
    }
}

impl OrchestratorConfig {
    /// Defaults with environment overrides (a `.env` file is loaded first).
    pub fn from_env() -> Self {
        // Silently ignore a missing .env file.
        let _ = dotenvy::dotenv();
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`. Malformed values are logged and ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(dir) = non_empty(ENV_RECORDINGS_DIR) {
            self.recordings_dir = PathBuf::from(dir.trim());
        }
        if let Some(path) = non_empty(ENV_PREFERENCES_PATH) {
            self.preferences_path = PathBuf::from(path.trim());
        }
        if let Some(raw) = non_empty(ENV_CATALOG_STALE_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.catalog_stale_after = Duration::from_secs(secs),
                Err(e) => log::warn!("Config: ignoring {}={:?}: {}", ENV_CATALOG_STALE_SECS, raw, e),
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_use_app_directories() {
        let config = OrchestratorConfig::default();
        assert!(config.recordings_dir.ends_with("scribo"));
        assert!(config.preferences_path.ends_with("scribo/preferences.json"));
        assert_eq!(config.catalog_stale_after, Duration::from_secs(30));
    }

    #[test]
    fn overrides_replace_defaults() {
        let config = OrchestratorConfig::default().with_overrides(lookup(&[
            (ENV_RECORDINGS_DIR, "/tmp/rec"),
            (ENV_PREFERENCES_PATH, "/tmp/prefs.json"),
            (ENV_CATALOG_STALE_SECS, "5"),
        ]));
        assert_eq!(config.recordings_dir, PathBuf::from("/tmp/rec"));
        assert_eq!(config.preferences_path, PathBuf::from("/tmp/prefs.json"));
        assert_eq!(config.catalog_stale_after, Duration::from_secs(5));
    }

    #[test]
    fn malformed_or_blank_overrides_are_ignored() {
        let defaults = OrchestratorConfig::default();
        let config = defaults.clone().with_overrides(lookup(&[
            (ENV_RECORDINGS_DIR, "   "),
            (ENV_CATALOG_STALE_SECS, "soon"),
        ]));
        assert_eq!(config, defaults);
    }
}
