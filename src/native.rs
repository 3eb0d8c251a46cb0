//! Seam to the native collaborator that enumerates devices and captures audio.
//!
//! The embedding application implements [`NativeBridge`]; it returns raw
//! boundary values exactly as the native side produced them. [`Native`] wraps a
//! bridge, tags failures with the operation name and runs every inbound value
//! through the schema validator.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{NativeOp, NativeOperationError, OrchestratorError, Result};
use crate::model::{ApplicationSource, InputDevice, RecordingEntry, SourceKind};
use crate::schema::{parse_list, Schema};

/// Remote procedures offered by the native side. Errors are native messages.
#[async_trait]
pub trait NativeBridge: Send + Sync + 'static {
    async fn list_apps(&self) -> Result<Value, String>;

    async fn list_input_devices(&self) -> Result<Value, String>;

    async fn start_capture(
        &self,
        kind: SourceKind,
        id: &str,
        output_path: &Path,
    ) -> Result<(), String>;

    /// Stops the running capture, if any.
    async fn stop_capture(&self) -> Result<(), String>;

    async fn list_recordings(&self) -> Result<Value, String>;

    async fn get_recording_data_url(&self, path: &str) -> Result<Value, String>;

    async fn delete_recording(&self, path: &str) -> Result<(), String>;
}

/// Validated access to a [`NativeBridge`].
#[derive(Clone)]
pub struct Native {
    bridge: Arc<dyn NativeBridge>,
}

fn native_err(op: NativeOp) -> impl FnOnce(String) -> OrchestratorError {
    move |message| {
        log::warn!("Native: {} failed: {}", op, message);
        NativeOperationError::new(op, message).into()
    }
}

fn invalid(op: NativeOp) -> impl FnOnce(crate::schema::ValidationError) -> OrchestratorError {
    move |err| {
        log::warn!("Native: {} returned malformed data: {}", op, err);
        err.into()
    }
}

impl Native {
    pub fn new(bridge: Arc<dyn NativeBridge>) -> Self {
        Self { bridge }
    }

    pub async fn list_apps(&self) -> Result<Vec<ApplicationSource>> {
        let op = NativeOp::ListApps;
        let raw = self.bridge.list_apps().await.map_err(native_err(op))?;
        let apps = parse_list(&raw).map_err(invalid(op))?;
        log::debug!("Native: {} returned {} applications", op, apps.len());
        Ok(apps)
    }

    pub async fn list_input_devices(&self) -> Result<Vec<InputDevice>> {
        let op = NativeOp::ListInputDevices;
        let raw = self.bridge.list_input_devices().await.map_err(native_err(op))?;
        let devices = parse_list(&raw).map_err(invalid(op))?;
        log::debug!("Native: {} returned {} devices", op, devices.len());
        Ok(devices)
    }

    pub async fn start_capture(&self, kind: SourceKind, id: &str, output_path: &Path) -> Result<()> {
        log::info!("Native: start_capture {} {} -> {:?}", kind, id, output_path);
        self.bridge
            .start_capture(kind, id, output_path)
            .await
            .map_err(native_err(NativeOp::StartCapture))
    }

    pub async fn stop_capture(&self) -> Result<()> {
        log::info!("Native: stop_capture");
        self.bridge
            .stop_capture()
            .await
            .map_err(native_err(NativeOp::StopCapture))
    }

    pub async fn list_recordings(&self) -> Result<Vec<RecordingEntry>> {
        let op = NativeOp::ListRecordings;
        let raw = self.bridge.list_recordings().await.map_err(native_err(op))?;
        parse_list(&raw).map_err(invalid(op))
    }

    /// Raw data URL for a recording; callers validate its format.
    pub async fn get_recording_data_url(&self, path: &str) -> Result<String> {
        let op = NativeOp::GetRecordingDataUrl;
        let raw = self
            .bridge
            .get_recording_data_url(path)
            .await
            .map_err(native_err(op))?;
        <String as Schema>::parse(&raw).map_err(invalid(op))
    }

    pub async fn delete_recording(&self, path: &str) -> Result<()> {
        log::info!("Native: delete_recording {}", path);
        self.bridge
            .delete_recording(path)
            .await
            .map_err(native_err(NativeOp::DeleteRecording))
    }
}
