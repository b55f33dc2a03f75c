/// Persistent application settings
///
/// Settings live next to the skin database as `settings.json`:
/// - Linux: ~/.local/share/skin-shelf/settings.json
/// - macOS: ~/Library/Application Support/skin-shelf/settings.json
/// - Windows: %APPDATA%\skin-shelf\settings.json

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const APP_DIR: &str = "skin-shelf";
const DATABASE_FILE: &str = "skins.db";
const SETTINGS_FILE: &str = "settings.json";

/// Everything the user can change that survives a restart.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    /// The "skins are stored locally" banner was closed
    pub notice_dismissed: bool,
    /// Optional `env_logger` filter, overridden by `RUST_LOG`
    pub log_filter: Option<String>,
    /// 3D preview options
    pub viewer: ViewerSettings,
}

/// Options applied to every rendering surface the viewport creates.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ViewerSettings {
    /// Clear colour as 0xRRGGBB
    pub background: u32,
    /// Drag to orbit the model
    pub enable_rotate: bool,
    /// Scroll to move the camera closer/further
    pub enable_zoom: bool,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            background: 0x404040,
            enable_rotate: true,
            enable_zoom: true,
        }
    }
}

impl ViewerSettings {
    /// Background as normalized RGB components
    pub fn background_rgb(&self) -> [f64; 3] {
        let channel = |shift: u32| ((self.background >> shift) & 0xff) as f64 / 255.0;
        [channel(16), channel(8), channel(0)]
    }
}

impl Settings {
    /// Convert to JSON string for storage
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load settings from `path`.
    ///
    /// A missing file yields the defaults silently; an unreadable or corrupt
    /// file yields the defaults with a warning so the app still starts.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => Self::from_json(&json).unwrap_or_else(|e| {
                log::warn!("⚠️  Ignoring corrupt settings at {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                log::warn!("⚠️  Could not read settings at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load from the default location, or defaults if there is no data directory
    pub fn load_default() -> Self {
        settings_path().map(|p| Self::load(&p)).unwrap_or_default()
    }

    /// Write settings to `path`, creating the parent directory if needed
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Per-user application directory, `None` if the platform has no home
pub fn data_dir() -> Option<PathBuf> {
    let mut path = dirs::data_dir().or_else(dirs::home_dir)?;
    path.push(APP_DIR);
    Some(path)
}

/// Where the skin database lives
pub fn database_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join(DATABASE_FILE))
}

/// Where `settings.json` lives
pub fn settings_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join(SETTINGS_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "skin-shelf-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_defaults_match_viewer_defaults() {
        let settings = Settings::default();
        assert!(!settings.notice_dismissed);
        assert_eq!(settings.viewer.background, 0x404040);
        assert!(settings.viewer.enable_rotate);
        assert!(settings.viewer.enable_zoom);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings = Settings::from_json(r#"{ "notice_dismissed": true }"#).unwrap();
        assert!(settings.notice_dismissed);
        assert_eq!(settings.viewer, ViewerSettings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = scratch_dir("settings");
        let path = dir.join("nested").join(SETTINGS_FILE);

        let mut settings = Settings::default();
        settings.notice_dismissed = true;
        settings.viewer.enable_zoom = false;
        settings.save(&path).unwrap();

        assert_eq!(Settings::load(&path), settings);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_or_corrupt_file_gives_defaults() {
        let dir = scratch_dir("corrupt");
        let path = dir.join(SETTINGS_FILE);
        assert_eq!(Settings::load(&path), Settings::default());

        fs::create_dir_all(&dir).unwrap();
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_background_rgb() {
        let viewer = ViewerSettings {
            background: 0xff8000,
            ..ViewerSettings::default()
        };
        let [r, g, b] = viewer.background_rgb();
        assert_eq!(r, 1.0);
        assert!((g - 128.0 / 255.0).abs() < 1e-9);
        assert_eq!(b, 0.0);
    }
}
