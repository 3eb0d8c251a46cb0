//! Scribo capture session orchestrator.
//!
//! Sits between the UI and the native capture library:
//! - `cache`: async resource cache with request coalescing and invalidation
//! - `capture`: Idle/Capturing lifecycle as a reducer plus a driver
//! - `preferences`: durable, validated device selections and settings
//! - `schema`: validation of every value crossing the native boundary
//!
//! [`Orchestrator`] is the context object that ties them together. The
//! native side is reached through the [`NativeBridge`] trait.

pub mod cache;
pub mod capture;
pub mod config;
pub mod error;
pub mod model;
pub mod native;
pub mod orchestrator;
pub mod preferences;
pub mod recordings;
pub mod schema;

pub use cache::{CacheKey, QueryState};
pub use capture::{ActiveCapture, CaptureStatus, StopOutcome};
pub use config::OrchestratorConfig;
pub use error::{CaptureRejection, NativeOp, NativeOperationError, OrchestratorError, Result};
pub use model::{ApplicationSource, InputDevice, RecordingEntry, SelectedSource, SourceKind};
pub use native::NativeBridge;
pub use orchestrator::Orchestrator;
pub use preferences::{AppSettings, PreferenceKey, PreferenceStore, SettingsPatch};
pub use recordings::PlaybackHandle;
pub use schema::ValidationError;
