//! Error taxonomy for the capture orchestrator.
//!
//! Every operation returns `Result<_, OrchestratorError>`. Errors are `Clone`
//! because a coalesced fetch hands the same result to every waiting caller.

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::model::SourceKind;
pub use crate::schema::ValidationError;

/// Remote procedures exposed by the native collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeOp {
    ListApps,
    ListInputDevices,
    StartCapture,
    StopCapture,
    ListRecordings,
    GetRecordingDataUrl,
    DeleteRecording,
}

impl NativeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            NativeOp::ListApps => "list_apps",
            NativeOp::ListInputDevices => "list_input_devices",
            NativeOp::StartCapture => "start_capture",
            NativeOp::StopCapture => "stop_capture",
            NativeOp::ListRecordings => "list_recordings",
            NativeOp::GetRecordingDataUrl => "get_recording_data_url",
            NativeOp::DeleteRecording => "delete_recording",
        }
    }
}

impl std::fmt::Display for NativeOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A native collaborator call failed. The message is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{op} failed: {message}")]
pub struct NativeOperationError {
    pub op: NativeOp,
    pub message: String,
}

impl NativeOperationError {
    pub fn new(op: NativeOp, message: impl Into<String>) -> Self {
        Self {
            op,
            message: message.into(),
        }
    }
}

/// Transitions the capture state machine refuses to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CaptureRejection {
    #[error("A capture is already in progress")]
    AlreadyCapturing,

    #[error("A capture is still starting")]
    StartPending,

    #[error("A capture is still stopping")]
    StopPending,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    #[error("Invalid data: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Native(#[from] NativeOperationError),

    #[error(transparent)]
    Capture(#[from] CaptureRejection),

    #[error("Unknown {kind} source: {id}")]
    UnknownSource { kind: SourceKind, id: String },

    #[error("Storage error: {0}")]
    Storage(String),

    /// A background capture task panicked or was cancelled by runtime shutdown.
    #[error("Capture task failed: {0}")]
    Task(String),
}

impl OrchestratorError {
    /// True for failures reported by the native collaborator.
    pub fn is_native(&self) -> bool {
        matches!(self, OrchestratorError::Native(_))
    }
}

// Errors cross the UI boundary as their display string.
impl Serialize for OrchestratorError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T, E = OrchestratorError> = std::result::Result<T, E>;
