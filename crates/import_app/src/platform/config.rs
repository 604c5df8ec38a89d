use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use import_engine::{ChannelSettings, PollSettings};
use import_logging::LogDestination;
use log::LevelFilter;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILENAME: &str = "recipe_import.ron";
pub const LOG_FILENAME: &str = "recipe_import.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogTarget {
    File,
    Terminal,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::File => LogDestination::File,
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

/// Settings read from `recipe_import.ron`; every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server_url: String,
    pub state_dir: PathBuf,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub auth_token: Option<String>,
    pub log_destination: LogTarget,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: ChannelSettings::default().base_url,
            state_dir: PathBuf::from(".recipe_import"),
            poll_interval_secs: PollSettings::default().interval.as_secs(),
            request_timeout_secs: ChannelSettings::default().request_timeout.as_secs(),
            auth_token: None,
            log_destination: LogTarget::File,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads the config file. An explicit path must exist; the default one may not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILENAME));
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && explicit.is_none() => {
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read config {path:?}"));
            }
        };
        let config: AppConfig =
            ron::from_str(&content).with_context(|| format!("failed to parse config {path:?}"))?;
        Ok(config)
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }

    pub fn channel_settings(&self) -> ChannelSettings {
        ChannelSettings {
            base_url: self.server_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
            auth_token: self.auth_token.clone(),
            ..ChannelSettings::default()
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(self.poll_interval_secs.max(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_config_must_exist() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("absent.ron");
        assert!(AppConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn defaults_match_engine_settings() {
        let config = AppConfig::default();
        assert_eq!(config.poll_settings().interval, import_engine::POLL_INTERVAL);
        assert_eq!(config.channel_settings().base_url, "http://localhost:8080");
        assert_eq!(config.log_destination, LogTarget::File);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cfg.ron");
        fs::write(
            &path,
            r#"(server_url: "https://api.recipes.test", log_destination: Both, poll_interval_secs: 2)"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.server_url, "https://api.recipes.test");
        assert_eq!(config.log_destination, LogTarget::Both);
        assert_eq!(config.poll_settings().interval, Duration::from_secs(2));
        assert_eq!(config.state_dir, PathBuf::from(".recipe_import"));
        assert_eq!(config.log_level(), LevelFilter::Info);
    }

    #[test]
    fn unparsable_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cfg.ron");
        fs::write(&path, "(server_url: 42").unwrap();
        assert!(AppConfig::load(Some(&path)).is_err());
    }
}
