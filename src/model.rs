//! Data model shared by the cache, the capture session and the UI boundary.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::null_as_empty;

/// An audio-producing application, as reported by one `list_apps` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSource {
    pub pid: u32,
    pub name: String,
    /// Empty when the platform has no bundle identifier for the process.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub bundle_id: String,
}

impl ApplicationSource {
    /// Label for pickers: name, then bundle id, then pid.
    pub fn display_name(&self) -> String {
        if !self.name.is_empty() {
            self.name.clone()
        } else if !self.bundle_id.is_empty() {
            self.bundle_id.clone()
        } else {
            self.pid.to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDevice {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub unique_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Application,
    Window,
    Display,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Application => "application",
            SourceKind::Window => "window",
            SourceKind::Display => "display",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a capture source by id. It is resolved against the latest
/// catalog snapshot whenever it is used, never held as a pointer into one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedSource {
    pub kind: SourceKind,
    pub id: String,
}

impl SelectedSource {
    pub fn application(id: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Application,
            id: id.into(),
        }
    }

    pub fn window(id: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Window,
            id: id.into(),
        }
    }

    pub fn display(id: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Display,
            id: id.into(),
        }
    }
}

/// A finished recording. `path` is the identity; file names may repeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingEntry {
    pub path: String,
    pub file_name: String,
    pub created_at_ms: i64,
}

impl RecordingEntry {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.created_at_ms).single()
    }
}

/// Find an application by the string form of its pid.
pub fn find_application<'a>(
    apps: &'a [ApplicationSource],
    id: &str,
) -> Option<&'a ApplicationSource> {
    let pid: u32 = id.trim().parse().ok()?;
    apps.iter().find(|app| app.pid == pid)
}

pub fn find_input_device<'a>(devices: &'a [InputDevice], id: &str) -> Option<&'a InputDevice> {
    devices.iter().find(|device| device.id == id)
}
