// Configuration management for playdeck
// Handles loading/saving settings, with sensible defaults when config is missing

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub catalog_path: PathBuf,
    pub log_dir: PathBuf,
    pub playback: PlaybackConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub initial_volume: f32, // 0.0 to 1.0
    pub start_looping: bool,
    pub poll_interval_ms: u64,
    /// Drop back to paused when the device refuses to start a track.
    /// Off by default: the requested state is kept and the failure is only reported.
    pub reset_on_device_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub volume_step: f32,
    pub seek_step_secs: u64,
    pub tick_rate_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_path: base_dir().join("catalog.json"),
            log_dir: Self::default_log_dir(),
            playback: PlaybackConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            initial_volume: 1.0,
            start_looping: true,
            poll_interval_ms: 250,
            reset_on_device_error: false,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            volume_step: 0.05,
            seek_step_secs: 5,
            tick_rate_ms: 100,
        }
    }
}

impl Config {
    /// Where logs go when no config has been read yet.
    pub fn default_log_dir() -> PathBuf {
        base_dir().join("logs")
    }

    /// Load from the default location, writing defaults there on first run.
    pub fn load() -> Result<Self> {
        Self::load_or_create(&Self::config_path()?)
    }

    pub fn load_or_create(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            Self::load_from(config_path)
        } else {
            let config = Config::default();
            config.save_to(config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let dir = app_dir().ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(dir.join("config.toml"))
    }
}

fn app_dir() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("playdeck"))
}

fn base_dir() -> PathBuf {
    app_dir().unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.playback.initial_volume = 0.4;
        config.playback.reset_on_device_error = true;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "catalog_path = \"/srv/catalog.json\"\n[playback]\nstart_looping = false\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.catalog_path, PathBuf::from("/srv/catalog.json"));
        assert!(!config.playback.start_looping);
        assert_eq!(config.playback.poll_interval_ms, 250);
        assert_eq!(config.ui, UiConfig::default());
    }

    #[test]
    fn test_default_log_dir_matches_defaults() {
        assert_eq!(Config::default().log_dir, Config::default_log_dir());
        assert!(Config::default_log_dir().ends_with("logs"));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[playback\ninitial_volume = ").unwrap();

        let err = Config::load_or_create(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config"));
    }

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("playdeck").join("config.toml");

        let config = Config::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.playback, PlaybackConfig::default());
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }
}
