use super::schema::FieldmarkConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations:
    /// 1. ./fieldmark.yaml
    /// 2. ~/.fieldmark/config.yaml
    /// 3. Default configuration
    pub async fn load_default() -> Result<FieldmarkConfig, ConfigError> {
        let local_config = PathBuf::from("./fieldmark.yaml");
        if local_config.exists() {
            return Self::load_from(&local_config).await;
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".fieldmark").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config).await;
            }
        }

        debug!("No config file found, using defaults");
        Ok(FieldmarkConfig::default())
    }

    pub async fn load_from(path: &Path) -> Result<FieldmarkConfig, ConfigError> {
        debug!("Loading config from {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        let config: FieldmarkConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "capture:\n  min_control_clearance_px: 12.5").unwrap();

        let config = ConfigLoader::load_from(file.path()).await.unwrap();
        assert_eq!(config.capture.min_control_clearance_px, 12.5);
        assert_eq!(config.broker.session_error_marker, "session");
        assert!(config.broker.default_system_prompt.is_empty());
        assert!(config.storage.path.ends_with("profile.json"));
    }

    #[tokio::test]
    async fn test_invalid_yaml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "capture: [not, a, map").unwrap();
        let err = ConfigLoader::load_from(file.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigLoader::load_from(&dir.path().join("absent.yaml"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
