//! Async resource cache for catalogs, recordings and stored selections.
//!
//! Each key is backed by a typed [`QueryCell`]. The cache provides:
//! - Request coalescing: concurrent fetches for one key share one load
//! - Staleness per key (time-based for device catalogs, invalidation-only
//!   for everything else)
//! - Mutations that invalidate a declared set of keys on success
//!
//! Nothing is fetched until first accessed.

mod query;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub use query::{QueryCell, QueryState};

use crate::error::Result;
use crate::model::{ApplicationSource, InputDevice, RecordingEntry};
use crate::preferences::AppSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Applications,
    InputDevices,
    Recordings,
    SelectedAppId,
    SelectedMicId,
    Settings,
}

impl CacheKey {
    pub const ALL: [CacheKey; 6] = [
        CacheKey::Applications,
        CacheKey::InputDevices,
        CacheKey::Recordings,
        CacheKey::SelectedAppId,
        CacheKey::SelectedMicId,
        CacheKey::Settings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKey::Applications => "applications",
            CacheKey::InputDevices => "input-devices",
            CacheKey::Recordings => "recordings",
            CacheKey::SelectedAppId => "selected-app-id",
            CacheKey::SelectedMicId => "selected-mic-id",
            CacheKey::Settings => "settings",
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cell per key. Cloning shares the underlying entries.
#[derive(Clone)]
pub struct ResourceCache {
    pub applications: QueryCell<Arc<Vec<ApplicationSource>>>,
    pub input_devices: QueryCell<Arc<Vec<InputDevice>>>,
    pub recordings: QueryCell<Arc<Vec<RecordingEntry>>>,
    pub selected_app_id: QueryCell<Option<String>>,
    pub selected_mic_id: QueryCell<Option<String>>,
    pub settings: QueryCell<AppSettings>,
}

impl ResourceCache {
    /// `catalog_stale_after` applies to the application and device catalogs.
    pub fn new(catalog_stale_after: Duration) -> Self {
        Self {
            applications: QueryCell::new(CacheKey::Applications, Some(catalog_stale_after)),
            input_devices: QueryCell::new(CacheKey::InputDevices, Some(catalog_stale_after)),
            recordings: QueryCell::new(CacheKey::Recordings, None),
            selected_app_id: QueryCell::new(CacheKey::SelectedAppId, None),
            selected_mic_id: QueryCell::new(CacheKey::SelectedMicId, None),
            settings: QueryCell::new(CacheKey::Settings, None),
        }
    }

    pub fn invalidate(&self, key: CacheKey) {
        log::debug!("Cache: invalidating {}", key);
        match key {
            CacheKey::Applications => self.applications.invalidate(),
            CacheKey::InputDevices => self.input_devices.invalidate(),
            CacheKey::Recordings => self.recordings.invalidate(),
            CacheKey::SelectedAppId => self.selected_app_id.invalidate(),
            CacheKey::SelectedMicId => self.selected_mic_id.invalidate(),
            CacheKey::Settings => self.settings.invalidate(),
        }
    }

    pub fn invalidate_all(&self, keys: &[CacheKey]) {
        for key in keys {
            self.invalidate(*key);
        }
    }

    pub fn state(&self, key: CacheKey) -> QueryState {
        match key {
            CacheKey::Applications => self.applications.state(),
            CacheKey::InputDevices => self.input_devices.state(),
            CacheKey::Recordings => self.recordings.state(),
            CacheKey::SelectedAppId => self.selected_app_id.state(),
            CacheKey::SelectedMicId => self.selected_mic_id.state(),
            CacheKey::Settings => self.settings.state(),
        }
    }

    /// Run a state-changing operation. On success `invalidates` are marked
    /// stale; on failure nothing changes and the error goes to this caller.
    ///
    /// Mutations are never coalesced.
    pub async fn mutate<T, Fut>(&self, invalidates: &[CacheKey], operation: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let value = operation.await?;
        self.invalidate_all(invalidates);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NativeOp, NativeOperationError, OrchestratorError};

    #[tokio::test]
    async fn successful_mutation_invalidates_declared_keys() {
        let cache = ResourceCache::new(Duration::from_secs(60));
        cache.recordings.set(Arc::new(vec![]));
        cache.applications.set(Arc::new(vec![]));

        cache
            .mutate(&[CacheKey::Recordings], async { Ok(()) })
            .await
            .unwrap();

        assert!(cache.state(CacheKey::Recordings).is_stale);
        assert!(!cache.state(CacheKey::Applications).is_stale);
    }

    #[tokio::test]
    async fn failed_mutation_leaves_cache_untouched() {
        let cache = ResourceCache::new(Duration::from_secs(60));
        cache.recordings.set(Arc::new(vec![]));

        let err = cache
            .mutate::<(), _>(&[CacheKey::Recordings], async {
                Err(OrchestratorError::from(NativeOperationError::new(
                    NativeOp::DeleteRecording,
                    "not found",
                )))
            })
            .await
            .unwrap_err();

        assert!(err.is_native());
        assert!(!cache.state(CacheKey::Recordings).is_stale);
    }

    #[test]
    fn keys_render_their_wire_names() {
        let names: Vec<&str> = CacheKey::ALL.iter().map(CacheKey::as_str).collect();
        assert_eq!(
            names,
            vec![
                "applications",
                "input-devices",
                "recordings",
                "selected-app-id",
                "selected-mic-id",
                "settings"
            ]
        );
    }

    #[test]
    fn unfetched_keys_report_stale_and_empty() {
        let cache = ResourceCache::new(Duration::from_secs(60));
        for key in CacheKey::ALL {
            let state = cache.state(key);
            assert!(!state.has_value);
            assert!(state.is_stale);
            assert_eq!(state.fetch_count, 0);
        }
    }
}
