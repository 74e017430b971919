// File: notifier/src/config/manager.rs
use super::Config;
use crate::errors::ConfigError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

#[derive(Debug)]
pub struct ConfigManager {
    path: PathBuf,
    current_config: Arc<Config>,
}

impl ConfigManager {
    /// Load and validate the configuration file.
    ///
    /// A missing file is not an error: the defaults are used and a warning
    /// is logged. A file that exists but fails to parse or validate is.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let config = Self::load_configuration(&path).await?;
        Ok(Self {
            path,
            current_config: Arc::new(config),
        })
    }

    pub fn get_current_config(&self) -> Arc<Config> {
        self.current_config.clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_configuration(path: &Path) -> Result<Config, ConfigError> {
        let config = if fs::try_exists(path).await.unwrap_or(false) {
            let content = fs::read_to_string(path)
                .await
                .map_err(|e| ConfigError::LoadFailed {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;

            toml::from_str::<Config>(&content).map_err(|e| ConfigError::ParseError {
                reason: format!("{}: {}", path.display(), e),
            })?
        } else {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            Config::default()
        };

        config.validate()?;

        info!(
            "Configuration loaded: lead time {}m, window {}h, max attempts {}, retention {}d",
            config.pipeline.lead_time_minutes,
            config.pipeline.window_hours,
            config.pipeline.max_attempts,
            config.pipeline.retention_days
        );

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn loads_file_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[database]
path = "/tmp/reminders-test.db"

[pipeline]
lead_time_minutes = 15
retention_days = 7
"#
        )
        .unwrap();

        let manager = ConfigManager::new(file.path()).await.unwrap();
        let config = manager.get_current_config();
        assert_eq!(config.database.path, "/tmp/reminders-test.db");
        assert_eq!(config.pipeline.lead_time_minutes, 15);
        assert_eq!(config.pipeline.retention_days, 7);
        assert_eq!(config.pipeline.max_attempts, 3);
    }

    #[tokio::test]
    async fn missing_file_falls_back_to_defaults() {
        let manager = ConfigManager::new("/nonexistent/notifier.toml")
            .await
            .unwrap();
        assert_eq!(manager.get_current_config().pipeline.window_hours, 24);
    }

    #[tokio::test]
    async fn malformed_file_is_a_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[pipeline\nmax_attempts = ").unwrap();

        let err = ConfigManager::new(file.path()).await.err().unwrap();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }
}
