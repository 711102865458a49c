//! User settings persisted as YAML.

use crate::capture::FilterProfile;
use crate::coordinator::HotkeyConfig;
use crate::player::PlaybackConfig;
use crate::{MacroError, MacroResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Capture options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Record pointer moves at all (buttons and wheel are always recorded).
    pub record_mouse_moves: bool,
    /// Use the fine-grained move filter (3px / 20ms instead of 8px / 50ms).
    pub high_precision: bool,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            record_mouse_moves: true,
            high_precision: false,
        }
    }
}

impl RecordingConfig {
    pub fn filter_profile(&self) -> FilterProfile {
        if self.high_precision {
            FilterProfile::HighPrecision
        } else {
            FilterProfile::Normal
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub recording: RecordingConfig,
    pub playback: PlaybackConfig,
    pub hotkeys: HotkeyConfig,
}

impl Settings {
    pub fn validate(&self) -> MacroResult<()> {
        self.playback.validate()?;
        self.hotkeys.validate()
    }

    pub fn to_yaml(&self) -> MacroResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Get the user config directory for mimic.
pub fn config_dir() -> PathBuf {
    let base = dirs_next::config_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("mimic")
}

/// Get the path to user settings file.
pub fn settings_file_path() -> PathBuf {
    config_dir().join("settings.yaml")
}

/// Load a YAML document from disk.
pub fn load_yaml<T: DeserializeOwned>(path: impl AsRef<Path>) -> MacroResult<T> {
    let content = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

/// Save a YAML document to disk, creating parent directories.
pub fn save_yaml<T: Serialize>(path: impl AsRef<Path>, value: &T) -> MacroResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_yaml::to_string(value)?)?;
    Ok(())
}

/// Load and validate settings from an explicit file.
pub fn load_settings(path: impl AsRef<Path>) -> MacroResult<Settings> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(MacroError::NotFound(path.to_path_buf()));
    }
    let settings: Settings = load_yaml(path)?;
    settings.validate()?;
    tracing::info!("Loaded settings from {:?}", path);
    Ok(settings)
}

/// Load settings from the user config directory.
/// Returns defaults if the file doesn't exist or is invalid.
pub fn load_user_settings() -> Settings {
    let path = settings_file_path();
    if !path.exists() {
        tracing::debug!("No settings.yaml found, using defaults");
        return Settings::default();
    }

    match load_settings(&path) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Failed to load {:?}: {}, using defaults", path, e);
            Settings::default()
        }
    }
}

/// Validate and write settings to an explicit file.
pub fn save_settings(path: impl AsRef<Path>, settings: &Settings) -> MacroResult<()> {
    settings.validate()?;
    save_yaml(&path, settings)?;
    tracing::info!("Saved settings to {:?}", path.as_ref());
    Ok(())
}

/// Write settings to the user config directory.
pub fn save_user_settings(settings: &Settings) -> MacroResult<PathBuf> {
    let path = settings_file_path();
    save_settings(&path, settings)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_falls_back_to_defaults() {
        let settings: Settings = serde_yaml::from_str(
            "playback:\n  loop_count: 3\nrecording:\n  high_precision: true\n",
        )
        .unwrap();
        assert_eq!(settings.playback.loop_count, 3);
        assert_eq!(settings.playback.speed_multiplier, 1.0);
        assert!(settings.recording.record_mouse_moves);
        assert_eq!(settings.recording.filter_profile(), FilterProfile::HighPrecision);
        assert_eq!(settings.hotkeys, HotkeyConfig::default());
    }

    #[test]
    fn test_load_settings_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "playback:\n  speed_multiplier: -1.0\n").unwrap();
        assert!(matches!(load_settings(&path), Err(MacroError::Configuration(_))));

        assert!(matches!(
            load_settings(dir.path().join("absent.yaml")),
            Err(MacroError::NotFound(_))
        ));
    }

    #[test]
    fn test_yaml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("settings.yaml");
        let mut settings = Settings::default();
        settings.playback.loop_count = 5;
        settings.recording.record_mouse_moves = false;

        save_yaml(&path, &settings).unwrap();
        assert_eq!(load_settings(&path).unwrap(), settings);
    }

    #[test]
    fn test_save_settings_refuses_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        let mut settings = Settings::default();

        save_settings(&path, &settings).unwrap();
        assert_eq!(load_settings(&path).unwrap(), settings);

        settings.playback.loop_count = 0;
        assert!(matches!(
            save_settings(&path, &settings),
            Err(MacroError::Configuration(_))
        ));
        assert_eq!(load_settings(&path).unwrap(), Settings::default());
        assert!(settings.to_yaml().unwrap().contains("loop_count: 0"));
    }
}
