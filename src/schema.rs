//! Shape validation for values crossing the native boundary or read back
//! from durable storage.
//!
//! Shapes are declared with `#[derive(Deserialize)]` on the model types.
//! Decoding goes through `serde_path_to_error` so a failure names the
//! offending field (`$[1].pid`). Checks serde cannot express (trimmed paths,
//! unique keys) run after decoding. Unknown fields are ignored. Optional
//! fields that are missing or `null` get their declared default so no null
//! leaks into application state.

use std::collections::HashSet;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use serde_path_to_error::Segment;
use thiserror::Error;

use crate::model::{ApplicationSource, InputDevice, RecordingEntry};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {message}")]
pub struct ValidationError {
    /// Path of the offending field, e.g. `$[0].pid`.
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: &FieldPath, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }

    fn from_serde<E: fmt::Display>(base: &FieldPath, err: serde_path_to_error::Error<E>) -> Self {
        let path = err.path().iter().fold(base.clone(), |path, segment| match segment {
            Segment::Seq { index } => path.index(*index),
            Segment::Map { key } => path.field(key),
            other => path.field(&other.to_string()),
        });
        Self::new(&path, err.inner().to_string())
    }
}

/// Location inside a boundary value, rendered JSONPath-style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn root() -> Self {
        FieldPath("$".to_string())
    }

    pub fn field(&self, name: &str) -> Self {
        FieldPath(format!("{}.{}", self.0, name))
    }

    pub fn index(&self, i: usize) -> Self {
        FieldPath(format!("{}[{}]", self.0, i))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A type with a declared boundary shape.
pub trait Schema: DeserializeOwned {
    /// Checks run on an already decoded value.
    fn validate(self, _path: &FieldPath) -> Result<Self, ValidationError> {
        Ok(self)
    }

    fn parse(value: &Value) -> Result<Self, ValidationError> {
        let root = FieldPath::root();
        decode::<Self>(value, &root)?.validate(&root)
    }
}

/// Items of a list that must be unique by some key.
pub trait UniqueKey {
    /// Field name reported when a duplicate is found.
    const KEY_FIELD: &'static str;

    fn unique_key(&self) -> String;
}

fn decode<T: DeserializeOwned>(value: &Value, path: &FieldPath) -> Result<T, ValidationError> {
    serde_path_to_error::deserialize(value).map_err(|e| ValidationError::from_serde(path, e))
}

/// Parse an array of `T`, rejecting duplicate keys.
pub fn parse_list<T: Schema + UniqueKey>(value: &Value) -> Result<Vec<T>, ValidationError> {
    let root = FieldPath::root();
    let items: Vec<T> = decode(value, &root)?;

    let mut seen = HashSet::with_capacity(items.len());
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        let path = root.index(i);
        let item = item.validate(&path)?;
        let key = item.unique_key();
        if !seen.insert(key.clone()) {
            return Err(ValidationError::new(
                &path.field(T::KEY_FIELD),
                format!("duplicate value {:?}", key),
            ));
        }
        out.push(item);
    }
    Ok(out)
}

/// Trim and require a non-empty result.
pub fn non_empty_trimmed(raw: &str, path: &FieldPath) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(path, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// `deserialize_with` helper: a `null` optional string reads as `""`.
pub(crate) fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode a JSON document from text, e.g. a stored record.
pub fn parse_str<T: DeserializeOwned>(raw: &str) -> Result<T, ValidationError> {
    let mut de = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize(&mut de).map_err(|e| ValidationError::from_serde(&FieldPath::root(), e))
}

impl Schema for ApplicationSource {}

impl UniqueKey for ApplicationSource {
    const KEY_FIELD: &'static str = "pid";

    fn unique_key(&self) -> String {
        self.pid.to_string()
    }
}

impl Schema for InputDevice {}

impl UniqueKey for InputDevice {
    const KEY_FIELD: &'static str = "id";

    fn unique_key(&self) -> String {
        self.id.clone()
    }
}

impl Schema for RecordingEntry {
    fn validate(mut self, path: &FieldPath) -> Result<Self, ValidationError> {
        self.path = non_empty_trimmed(&self.path, &path.field("path"))?;
        Ok(self)
    }
}

impl UniqueKey for RecordingEntry {
    const KEY_FIELD: &'static str = "path";

    fn unique_key(&self) -> String {
        self.path.clone()
    }
}

impl Schema for String {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn app_list_defaults_missing_bundle_id() {
        let apps: Vec<ApplicationSource> =
            parse_list(&json!([{ "pid": 10, "name": "Chrome" }])).unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].pid, 10);
        assert_eq!(apps[0].bundle_id, "");
    }

    #[test]
    fn null_optional_field_gets_default() {
        let device = InputDevice::parse(&json!({ "id": "mic", "name": "Mic", "uniqueId": null })).unwrap();
        assert_eq!(device.unique_id, "");
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let app = ApplicationSource::parse(&json!({
            "pid": 3, "name": "Zoom", "bundleId": "us.zoom", "windows": [1, 2]
        }))
        .unwrap();
        assert_eq!(app.bundle_id, "us.zoom");
    }

    #[test]
    fn error_names_offending_field() {
        let err = parse_list::<ApplicationSource>(&json!([
            { "pid": 1, "name": "a" },
            { "pid": "2", "name": "b" }
        ]))
        .unwrap_err();
        assert_eq!(err.path, "$[1].pid");
    }

    #[test]
    fn negative_and_fractional_pids_are_rejected() {
        let err = ApplicationSource::parse(&json!({ "pid": -1, "name": "x" })).unwrap_err();
        assert_eq!(err.path, "$.pid");
        let err = ApplicationSource::parse(&json!({ "pid": 1.5, "name": "x" })).unwrap_err();
        assert_eq!(err.path, "$.pid");
    }

    #[test]
    fn missing_required_field_is_reported() {
        let err = InputDevice::parse(&json!({ "id": "mic" })).unwrap_err();
        assert_eq!(err.path, "$");
        assert!(err.message.contains("name"), "{}", err.message);
    }

    #[test]
    fn blank_recording_path_is_rejected_after_decoding() {
        let err = parse_list::<RecordingEntry>(&json!([
            { "path": "/rec/a.wav", "fileName": "a.wav", "createdAtMs": 1 },
            { "path": "  ", "fileName": "b.wav", "createdAtMs": 2 }
        ]))
        .unwrap_err();
        assert_eq!(err.path, "$[1].path");
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let err = parse_list::<RecordingEntry>(&json!([
            { "path": "/rec/a.wav", "fileName": "a.wav", "createdAtMs": 1 },
            { "path": " /rec/a.wav", "fileName": "a.wav", "createdAtMs": 2 }
        ]))
        .unwrap_err();
        assert_eq!(err.path, "$[1].path");
        assert!(err.message.contains("duplicate"));
    }

    #[test]
    fn non_array_list_is_rejected() {
        let err = parse_list::<InputDevice>(&json!({ "devices": [] })).unwrap_err();
        assert_eq!(err.path, "$");
    }

    #[test]
    fn stored_text_errors_carry_field_path() {
        let err = parse_str::<InputDevice>(r#"{ "id": 5, "name": "Mic" }"#).unwrap_err();
        assert_eq!(err.path, "$.id");
    }

    #[test]
    fn trimmed_values_must_not_be_empty() {
        let root = FieldPath::root();
        assert_eq!(non_empty_trimmed("  42 ", &root).unwrap(), "42");
        assert!(non_empty_trimmed("   ", &root).is_err());
    }
}
