use serde::{Deserialize, Serialize};

use crate::schema::{parse_str, ValidationError};

/// Application settings, persisted as one JSON record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSettings {
    /// API key for Gemini summaries. Never logged.
    pub gemini_api_key: String,
}

/// Partial update; `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsPatch {
    pub gemini_api_key: Option<String>,
}

impl AppSettings {
    /// Trim every field.
    pub fn normalized(self) -> Self {
        Self {
            gemini_api_key: self.gemini_api_key.trim().to_string(),
        }
    }

    /// Shallow merge: fields present in `patch` overwrite, the rest are kept.
    pub fn merged(&self, patch: SettingsPatch) -> Self {
        Self {
            gemini_api_key: patch
                .gemini_api_key
                .unwrap_or_else(|| self.gemini_api_key.clone()),
        }
        .normalized()
    }

    pub fn has_gemini_api_key(&self) -> bool {
        !self.gemini_api_key.is_empty()
    }

    /// Masked key for display, e.g. "AIz...abc123".
    pub fn masked_gemini_api_key(&self) -> Option<String> {
        if !self.has_gemini_api_key() {
            return None;
        }
        let chars: Vec<char> = self.gemini_api_key.chars().collect();
        if chars.len() <= 8 {
            return Some("*".repeat(chars.len()));
        }
        let head: String = chars[..3].iter().collect();
        let tail: String = chars[chars.len() - 6..].iter().collect();
        Some(format!("{}...{}", head, tail))
    }
}

/// Parse a stored settings record. Unknown fields are ignored, missing ones
/// take their defaults.
pub fn parse_settings(raw: &str) -> Result<AppSettings, ValidationError> {
    parse_str::<AppSettings>(raw).map(AppSettings::normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims_and_defaults() {
        let settings = parse_settings(r#"{ "geminiApiKey": "  key-1  ", "theme": "dark" }"#).unwrap();
        assert_eq!(settings.gemini_api_key, "key-1");
        assert_eq!(parse_settings("{}").unwrap(), AppSettings::default());
    }

    #[test]
    fn parse_rejects_wrong_types() {
        let err = parse_settings(r#"{ "geminiApiKey": 5 }"#).unwrap_err();
        assert_eq!(err.path, "$.geminiApiKey");
        assert!(parse_settings("not json").is_err());
    }

    #[test]
    fn merge_keeps_unpatched_fields() {
        let current = AppSettings {
            gemini_api_key: "old".into(),
        };
        assert_eq!(current.merged(SettingsPatch::default()), current);
        let next = current.merged(SettingsPatch {
            gemini_api_key: Some(" new ".into()),
        });
        assert_eq!(next.gemini_api_key, "new");
    }

    #[test]
    fn masked_key_hides_the_middle() {
        let settings = AppSettings {
            gemini_api_key: "AIzaSyExampleKey123456".into(),
        };
        assert_eq!(settings.masked_gemini_api_key().as_deref(), Some("AIz...123456"));
        let short = AppSettings {
            gemini_api_key: "abc".into(),
        };
        assert_eq!(short.masked_gemini_api_key().as_deref(), Some("***"));
        assert_eq!(AppSettings::default().masked_gemini_api_key(), None);
    }
}
