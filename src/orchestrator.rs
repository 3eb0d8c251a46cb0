//! The capture session orchestrator: one context object owning the cache,
//! the preference store and the capture session, passed to every operation.

use std::sync::Arc;

use tokio::sync::watch;

use crate::cache::{CacheKey, QueryState, ResourceCache};
use crate::capture::{ActiveCapture, CaptureSession, CaptureStatus, OutputPaths, StopOutcome};
use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, Result};
use crate::model::{
    find_application, find_input_device, ApplicationSource, InputDevice, RecordingEntry,
    SelectedSource, SourceKind,
};
use crate::native::{Native, NativeBridge};
use crate::preferences::{AppSettings, JsonFileBackend, PreferenceKey, PreferenceStore, SettingsPatch};
use crate::recordings::{validate_recording_path, PlaybackHandle};
use crate::schema::{non_empty_trimmed, FieldPath, ValidationError};

pub struct Orchestrator {
    native: Native,
    cache: ResourceCache,
    preferences: PreferenceStore,
    session: CaptureSession,
}

impl Orchestrator {
    pub fn new(
        bridge: Arc<dyn NativeBridge>,
        preferences: PreferenceStore,
        config: &OrchestratorConfig,
    ) -> Self {
        let native = Native::new(bridge);
        let cache = ResourceCache::new(config.catalog_stale_after);
        let session = CaptureSession::new(
            native.clone(),
            cache.clone(),
            OutputPaths::new(config.recordings_dir.clone()),
        );
        log::info!(
            "Orchestrator: recordings in {:?}, catalogs stale after {:?}",
            config.recordings_dir,
            config.catalog_stale_after
        );
        Self {
            native,
            cache,
            preferences,
            session,
        }
    }

    /// Preferences persisted to `config.preferences_path`.
    pub fn from_config(bridge: Arc<dyn NativeBridge>, config: &OrchestratorConfig) -> Self {
        let backend = JsonFileBackend::open(config.preferences_path.clone());
        Self::new(bridge, PreferenceStore::new(Arc::new(backend)), config)
    }

    pub fn query_state(&self, key: CacheKey) -> QueryState {
        self.cache.state(key)
    }

    // ------------------------------------------------------------------
    // Catalogs
    // ------------------------------------------------------------------

    pub async fn applications(&self) -> Result<Arc<Vec<ApplicationSource>>> {
        let native = self.native.clone();
        self.cache
            .applications
            .get(move || async move { native.list_apps().await.map(Arc::new) })
            .await
    }

    pub async fn refresh_applications(&self) -> Result<Arc<Vec<ApplicationSource>>> {
        let native = self.native.clone();
        self.cache
            .applications
            .fetch(move || async move { native.list_apps().await.map(Arc::new) })
            .await
    }

    pub async fn input_devices(&self) -> Result<Arc<Vec<InputDevice>>> {
        let native = self.native.clone();
        self.cache
            .input_devices
            .get(move || async move { native.list_input_devices().await.map(Arc::new) })
            .await
    }

    pub async fn refresh_input_devices(&self) -> Result<Arc<Vec<InputDevice>>> {
        let native = self.native.clone();
        self.cache
            .input_devices
            .fetch(move || async move { native.list_input_devices().await.map(Arc::new) })
            .await
    }

    pub async fn recordings(&self) -> Result<Arc<Vec<RecordingEntry>>> {
        let native = self.native.clone();
        self.cache
            .recordings
            .get(move || async move { native.list_recordings().await.map(Arc::new) })
            .await
    }

    pub async fn refresh_recordings(&self) -> Result<Arc<Vec<RecordingEntry>>> {
        let native = self.native.clone();
        self.cache
            .recordings
            .fetch(move || async move { native.list_recordings().await.map(Arc::new) })
            .await
    }

    /// Latest application snapshot, even if stale; fetched on first access.
    async fn latest_applications(&self) -> Result<Arc<Vec<ApplicationSource>>> {
        match self.cache.applications.peek() {
            Some(apps) => Ok(apps),
            None => self.applications().await,
        }
    }

    async fn latest_input_devices(&self) -> Result<Arc<Vec<InputDevice>>> {
        match self.cache.input_devices.peek() {
            Some(devices) => Ok(devices),
            None => self.input_devices().await,
        }
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Persist the chosen application pid and update the cached selection.
    pub async fn select_application(&self, pid: &str) -> Result<String> {
        let saved = self
            .cache
            .mutate(&[CacheKey::SelectedAppId], async move {
                self.preferences.save(PreferenceKey::LastSelectedAppPid, pid)
            })
            .await?;
        self.cache.selected_app_id.set(Some(saved.clone()));
        Ok(saved)
    }

    pub async fn select_input_device(&self, id: &str) -> Result<String> {
        let saved = self
            .cache
            .mutate(&[CacheKey::SelectedMicId], async move {
                self.preferences.save(PreferenceKey::LastSelectedMicId, id)
            })
            .await?;
        self.cache.selected_mic_id.set(Some(saved.clone()));
        Ok(saved)
    }

    async fn stored_selection(&self, key: PreferenceKey) -> Result<Option<String>> {
        let preferences = self.preferences.clone();
        let load = move || async move { Ok::<_, OrchestratorError>(preferences.load(key)) };
        match key {
            PreferenceKey::LastSelectedAppPid => self.cache.selected_app_id.get(load).await,
            PreferenceKey::LastSelectedMicId => self.cache.selected_mic_id.get(load).await,
        }
    }

    /// The stored application, if it is still in the latest catalog.
    /// A stored pid that has disappeared reads as unset.
    pub async fn selected_application(&self) -> Result<Option<ApplicationSource>> {
        let Some(id) = self.stored_selection(PreferenceKey::LastSelectedAppPid).await? else {
            return Ok(None);
        };
        let apps = self.latest_applications().await?;
        let found = find_application(&apps, &id).cloned();
        if found.is_none() {
            log::debug!("Orchestrator: stored application {} not in catalog, treating as unset", id);
        }
        Ok(found)
    }

    /// The stored microphone, if it is still in the latest catalog.
    pub async fn selected_input_device(&self) -> Result<Option<InputDevice>> {
        let Some(id) = self.stored_selection(PreferenceKey::LastSelectedMicId).await? else {
            return Ok(None);
        };
        let devices = self.latest_input_devices().await?;
        let found = find_input_device(&devices, &id).cloned();
        if found.is_none() {
            log::debug!("Orchestrator: stored input device {} not in catalog, treating as unset", id);
        }
        Ok(found)
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    pub async fn settings(&self) -> Result<AppSettings> {
        let preferences = self.preferences.clone();
        self.cache
            .settings
            .get(move || async move { Ok(preferences.load_settings()) })
            .await
    }

    pub async fn set_settings(&self, next: AppSettings) -> Result<AppSettings> {
        let saved = self
            .cache
            .mutate(&[CacheKey::Settings], async move { self.preferences.save_settings(next) })
            .await?;
        self.cache.settings.set(saved.clone());
        Ok(saved)
    }

    pub async fn update_settings(&self, patch: SettingsPatch) -> Result<AppSettings> {
        let saved = self
            .cache
            .mutate(&[CacheKey::Settings], async move { self.preferences.update_settings(patch) })
            .await?;
        self.cache.settings.set(saved.clone());
        Ok(saved)
    }

    // ------------------------------------------------------------------
    // Capture
    // ------------------------------------------------------------------

    /// Start capturing `source`.
    ///
    /// Application sources must be present in the latest application
    /// snapshot. Window and display ids are only checked for emptiness; this
    /// layer keeps no catalog for them.
    pub async fn start_capture(&self, source: SelectedSource) -> Result<ActiveCapture> {
        let id = non_empty_trimmed(&source.id, &FieldPath::root().field("id"))?;
        if source.kind == SourceKind::Application {
            let apps = self.latest_applications().await?;
            if find_application(&apps, &id).is_none() {
                return Err(OrchestratorError::UnknownSource {
                    kind: source.kind,
                    id,
                });
            }
        }
        self.session
            .start(SelectedSource {
                kind: source.kind,
                id,
            })
            .await
    }

    /// Start capturing the stored application selection.
    pub async fn start_selected_application(&self) -> Result<ActiveCapture> {
        let app = self.selected_application().await?.ok_or_else(|| {
            ValidationError::new(
                &FieldPath::root().field(PreferenceKey::LastSelectedAppPid.as_str()),
                "no application selected",
            )
        })?;
        self.start_capture(SelectedSource::application(app.pid.to_string()))
            .await
    }

    pub async fn stop_capture(&self) -> Result<StopOutcome> {
        self.session.stop().await
    }

    pub fn capture_status(&self) -> CaptureStatus {
        self.session.status()
    }

    pub fn subscribe_capture(&self) -> watch::Receiver<CaptureStatus> {
        self.session.subscribe()
    }

    // ------------------------------------------------------------------
    // Recordings
    // ------------------------------------------------------------------

    /// Delete a recording. The recordings list is invalidated only if the
    /// native delete succeeds.
    pub async fn delete_recording(&self, path: &str) -> Result<()> {
        let path = validate_recording_path(path)?;
        self.cache
            .mutate(&[CacheKey::Recordings], self.native.delete_recording(&path))
            .await
    }

    /// Fresh playback data for `path`. Never cached.
    pub async fn playback(&self, path: &str) -> Result<PlaybackHandle> {
        let path = validate_recording_path(path)?;
        let data_url = self.native.get_recording_data_url(&path).await?;
        PlaybackHandle::parse(data_url).map_err(|e| {
            log::warn!("Orchestrator: playback data for {} is malformed: {}", path, e);
            e.into()
        })
    }
}
