//! Recording playback handles and path validation.
//!
//! Playback data is fetched fresh for every play action and never cached.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

use crate::schema::{non_empty_trimmed, FieldPath, ValidationError};

const BASE64_MARKER: &str = ";base64";

/// A playable recording as a `data:<mime>;base64,<payload>` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackHandle {
    data_url: String,
    mime_type: String,
    #[serde(skip)]
    payload_start: usize,
}

impl PlaybackHandle {
    pub fn parse(data_url: String) -> Result<Self, ValidationError> {
        let root = FieldPath::root();
        let rest = data_url
            .strip_prefix("data:")
            .ok_or_else(|| ValidationError::new(&root, "expected a data: URL"))?;
        let comma = rest
            .find(',')
            .ok_or_else(|| ValidationError::new(&root, "data URL has no payload"))?;
        let header = &rest[..comma];
        let mime_type = header
            .strip_suffix(BASE64_MARKER)
            .ok_or_else(|| ValidationError::new(&root, "data URL is not base64 encoded"))?;
        if mime_type.is_empty() {
            return Err(ValidationError::new(&root, "data URL has no media type"));
        }
        let mime_type = mime_type.to_string();
        let payload_start = "data:".len() + comma + 1;
        Ok(Self {
            data_url,
            mime_type,
            payload_start,
        })
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Decode the payload bytes.
    pub fn decode(&self) -> Result<Vec<u8>, ValidationError> {
        STANDARD
            .decode(&self.data_url[self.payload_start..])
            .map_err(|e| ValidationError::new(&FieldPath::root(), format!("invalid base64 payload: {}", e)))
    }
}

/// Recording paths are trimmed and must not be empty.
pub fn validate_recording_path(path: &str) -> Result<String, ValidationError> {
    non_empty_trimmed(path, &FieldPath::root().field("path"))
}
