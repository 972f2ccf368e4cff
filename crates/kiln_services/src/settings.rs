//! Settings management

use kiln_context::{CapabilityAttributes, ContextRequest};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings")]
    Parse(#[from] serde_json::Error),
}

/// Engine settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub window: WindowSettings,
    pub context: ContextSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    pub request: ContextRequest,
    /// Report driver capabilities on the first negotiation
    pub verbose: bool,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "Kiln".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            request: ContextRequest::default(),
            verbose: true,
        }
    }
}

impl Settings {
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json_str(&json)?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    pub fn to_json_string(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn attributes(&self) -> &CapabilityAttributes {
        &self.context.request.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_context::{Api, ContextPriority};

    #[test]
    fn empty_document_is_default() {
        let settings = Settings::from_json_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.window.width, 1280);
        assert!(settings.context.verbose);
    }

    #[test]
    fn partial_request_keeps_other_defaults() {
        let json = r#"{
            "window": { "width": 800, "height": 600 },
            "context": {
                "request": {
                    "attributes": {
                        "stencil_bits": 8,
                        "aa_samples": 4,
                        "context_priority": "High"
                    },
                    "min_api": "OpenGLES3"
                }
            }
        }"#;
        let settings = Settings::from_json_str(json).unwrap();
        assert_eq!(settings.window.title, "Kiln");
        assert_eq!((settings.window.width, settings.window.height), (800, 600));

        let attrs = settings.attributes();
        assert_eq!(attrs.stencil_bits, 8);
        assert_eq!(attrs.aa_samples, 4);
        assert_eq!(attrs.depth_bits, 24);
        assert_eq!(attrs.context_priority, ContextPriority::High);
        assert_eq!(settings.context.request.min_api, Api::OpenGLES3);
        assert_eq!(settings.context.request.max_api, Api::OpenGLES32);
    }

    #[test]
    fn written_settings_read_back() {
        let mut settings = Settings::default();
        settings.context.request.attributes.explicit_config_id = Some(7);
        let json = settings.to_json_string().unwrap();
        assert_eq!(Settings::from_json_str(&json).unwrap(), settings);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(Settings::from_json_str("{ nope"), Err(SettingsError::Parse(_))));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Settings::load("/nonexistent/kiln/settings.json").unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
    }
}
