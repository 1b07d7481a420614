//! User settings persistence for the crop dialog.
//!
//! This module remembers the choices that outlive one dialog: where crops
//! are stored, which preset opens first and the texts of the preview
//! overlay.

use crate::aspect::{find_preset, DEFAULT_PRESET, PRESETS};
use crate::config::Config;
use crate::error::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// User-configurable settings persisted between sessions.
///
/// Settings are stored as JSON in the user's config directory
/// (e.g., `~/.config/header-crop/settings.json` on Linux).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// CMS folder the crops are uploaded to.
    pub destination: String,
    /// Key of the preset selected when the dialog opens.
    #[serde(default = "default_preset_key")]
    pub preset: String,
    /// Title line of the preview overlay.
    pub preview_title: String,
    /// Subtitle line of the preview overlay.
    pub preview_subtitle: String,
}

fn default_preset_key() -> String {
    PRESETS[DEFAULT_PRESET].key.to_string()
}

impl Settings {
    /// Returns the path to the settings file.
    ///
    /// Creates the config directory if it doesn't exist.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "travelcms", "header-crop").map(|dirs| {
            let config_dir = dirs.config_dir();
            if !config_dir.exists() {
                let _ = fs::create_dir_all(config_dir);
            }
            config_dir.join("settings.json")
        })
    }

    /// Loads settings from disk, falling back to the configuration's values
    /// if none were saved yet.
    pub fn load(config: &Config) -> Self {
        Self::config_path()
            .and_then(|path| Self::load_from(&path))
            .unwrap_or_else(|| Self::with_defaults(config))
    }

    /// Reads settings from a specific file; `None` if missing or unreadable.
    pub fn load_from(path: &Path) -> Option<Self> {
        fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
    }

    /// Creates default settings from the loaded configuration.
    pub fn with_defaults(config: &Config) -> Self {
        Self {
            destination: config.destination.clone(),
            preset: default_preset_key(),
            preview_title: config.preview_title.clone(),
            preview_subtitle: config.preview_subtitle.clone(),
        }
    }

    /// Persists settings to disk.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save(&self) -> Result<()> {
        if let Some(path) = Self::config_path() {
            self.save_to(&path)?;
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Index of the remembered preset, or the default one if the key is
    /// no longer known.
    pub fn preset_index(&self) -> usize {
        find_preset(&self.preset).unwrap_or(DEFAULT_PRESET)
    }

    /// Applies the settings on top of a configuration. Values the
    /// configuration pins (environment, command line) are kept.
    pub fn apply_to(&self, config: &Config) -> Config {
        let mut config = config.clone();
        let destination = self.destination.trim();
        if !config.pinned.destination && !destination.is_empty() {
            config.destination = destination.to_string();
        }
        if !config.pinned.preview_title {
            config.preview_title = self.preview_title.clone();
        }
        if !config.pinned.preview_subtitle {
            config.preview_subtitle = self.preview_subtitle.clone();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::builder()
            .with_base_url("http://localhost:3000")
            .with_destination("destinations")
            .build()
            .unwrap()
    }

    #[test]
    fn defaults_come_from_config() {
        let settings = Settings::with_defaults(&config());
        assert_eq!(settings.destination, "destinations");
        assert_eq!(settings.preset, "header");
        assert_eq!(settings.preset_index(), DEFAULT_PRESET);
    }

    #[test]
    fn settings_survive_a_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = Settings::with_defaults(&config());
        settings.preset = "square".to_string();
        settings.preview_title = "Peru".to_string();
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.preset_index(), 3);
    }

    #[test]
    fn missing_or_corrupt_files_yield_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load_from(&dir.path().join("absent.json")).is_none());

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "{ nope").unwrap();
        assert!(Settings::load_from(&corrupt).is_none());
    }

    #[test]
    fn unknown_preset_key_falls_back() {
        let mut settings = Settings::with_defaults(&config());
        settings.preset = "panorama".to_string();
        assert_eq!(settings.preset_index(), DEFAULT_PRESET);
    }

    #[test]
    fn blank_destination_does_not_override_config() {
        let mut settings = Settings::with_defaults(&config());
        settings.destination = " ".to_string();
        settings.preview_subtitle = "Ontdek Japan".to_string();

        let applied = settings.apply_to(&config());
        assert_eq!(applied.destination, "destinations");
        assert_eq!(applied.preview_subtitle, "Ontdek Japan");
    }

    fn unpinned() -> Config {
        Config::builder()
            .with_base_url("http://localhost:3000")
            .build()
            .unwrap()
    }

    #[test]
    fn saved_values_fill_unpinned_config() {
        let mut settings = Settings::with_defaults(&unpinned());
        settings.destination = "peru".to_string();
        settings.preview_title = "Ontdek Peru".to_string();

        let applied = settings.apply_to(&unpinned());
        assert_eq!(applied.destination, "peru");
        assert_eq!(applied.preview_title, "Ontdek Peru");
    }

    #[test]
    fn pinned_destination_beats_saved_settings() {
        let saved = Settings::with_defaults(&unpinned());
        assert_eq!(saved.destination, "headers");

        let mut config = unpinned();
        config.pin_destination("destinations");

        let applied = saved.apply_to(&config);
        assert_eq!(applied.destination, "destinations");
    }

    #[test]
    fn pinned_preview_texts_beat_saved_settings() {
        let config = Config::builder()
            .with_base_url("http://localhost:3000")
            .with_preview_title("Ontdek Japan")
            .with_preview_subtitle("Tokio en Kyoto")
            .build()
            .unwrap();
        let mut saved = Settings::with_defaults(&unpinned());
        saved.preview_title = "Oud".to_string();
        saved.preview_subtitle = "Ouder".to_string();

        let applied = saved.apply_to(&config);
        assert_eq!(applied.preview_title, "Ontdek Japan");
        assert_eq!(applied.preview_subtitle, "Tokio en Kyoto");
    }
}
