use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldmarkConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON file holding the profile.
    #[serde(default = "default_profile_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_profile_path(),
        }
    }
}

fn default_profile_path() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(".fieldmark").join("profile.json"),
        None => PathBuf::from(".fieldmark/profile.json"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Minimum distance from the viewport top before a field gets
    /// capture/ignore controls.
    #[serde(default = "default_min_control_clearance_px")]
    pub min_control_clearance_px: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            min_control_clearance_px: default_min_control_clearance_px(),
        }
    }
}

fn default_min_control_clearance_px() -> f32 {
    30.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Substring of a stream error that invalidates the stored session.
    #[serde(default = "default_session_error_marker")]
    pub session_error_marker: String,
    #[serde(default)]
    pub default_system_prompt: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            session_error_marker: default_session_error_marker(),
            default_system_prompt: String::new(),
        }
    }
}

fn default_session_error_marker() -> String {
    "session".to_string()
}
