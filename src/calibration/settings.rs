// Settings storage for calibration offset and theme preference
//
// Mirrors the browser key/value layout: the offset lives under
// `wheelieMeterCalibration` as a decimal string and the theme under
// `wheelieMeterTheme` as "light" or "dark".

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// Cosmetic theme preference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemePreference {
    #[default]
    Dark,
    Light,
}

impl ThemePreference {
    fn as_str(&self) -> &'static str {
        match self {
            ThemePreference::Dark => "dark",
            ThemePreference::Light => "light",
        }
    }

    fn parse(value: &str) -> Self {
        if value == "light" {
            ThemePreference::Light
        } else {
            ThemePreference::Dark
        }
    }
}

/// Key/value settings collaborator used by the meter context
pub trait SettingsStore: Send + Sync {
    /// Persisted calibration offset, if any
    fn load_offset(&self) -> Option<f64>;

    /// Persist a calibration offset
    fn save_offset(&self, offset: f64) -> Result<(), SettingsError>;

    /// Persisted theme preference (defaults to dark)
    fn load_theme(&self) -> ThemePreference;

    /// Persist a theme preference
    fn save_theme(&self, theme: ThemePreference) -> Result<(), SettingsError>;
}

/// On-disk representation shared by the stores
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredSettings {
    #[serde(rename = "wheelieMeterCalibration", default)]
    calibration: Option<String>,
    #[serde(rename = "wheelieMeterTheme", default)]
    theme: Option<String>,
}

impl StoredSettings {
    fn offset(&self) -> Option<f64> {
        let raw = self.calibration.as_deref()?;
        match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => Some(value),
            _ => {
                log::warn!("[Settings] Ignoring invalid stored calibration {:?}", raw);
                None
            }
        }
    }

    fn theme(&self) -> ThemePreference {
        self.theme
            .as_deref()
            .map(ThemePreference::parse)
            .unwrap_or_default()
    }
}

/// In-memory settings store, used by tests and the CLI
#[derive(Debug, Default)]
pub struct MemorySettings {
    inner: Mutex<StoredSettings>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a raw calibration string, as a browser would hold it
    pub fn with_raw_calibration(raw: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(StoredSettings {
                calibration: Some(raw.into()),
                theme: None,
            }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoredSettings>, SettingsError> {
        self.inner.lock().map_err(|_| SettingsError::Io {
            details: "settings lock poisoned".to_string(),
        })
    }
}

impl SettingsStore for MemorySettings {
    fn load_offset(&self) -> Option<f64> {
        self.lock().ok()?.offset()
    }

    fn save_offset(&self, offset: f64) -> Result<(), SettingsError> {
        self.lock()?.calibration = Some(offset.to_string());
        Ok(())
    }

    fn load_theme(&self) -> ThemePreference {
        self.lock().map(|s| s.theme()).unwrap_or_default()
    }

    fn save_theme(&self, theme: ThemePreference) -> Result<(), SettingsError> {
        self.lock()?.theme = Some(theme.as_str().to_string());
        Ok(())
    }
}

/// JSON file settings store
///
/// Every save rewrites the whole file; reads go back to disk so external
/// edits are picked up.
#[derive(Debug, Clone)]
pub struct JsonFileSettings {
    path: PathBuf,
}

impl JsonFileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StoredSettings, SettingsError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(StoredSettings::default()),
            Err(err) => Err(err.into()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut StoredSettings)) -> Result<(), SettingsError> {
        let mut stored = self.read().unwrap_or_else(|err| {
            log::warn!(
                "[Settings] Discarding unreadable settings file {:?}: {}",
                self.path,
                err
            );
            StoredSettings::default()
        });
        apply(&mut stored);
        let json = serde_json::to_string_pretty(&stored)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl SettingsStore for JsonFileSettings {
    fn load_offset(&self) -> Option<f64> {
        match self.read() {
            Ok(stored) => stored.offset(),
            Err(err) => {
                log::warn!("[Settings] Failed to load {:?}: {}", self.path, err);
                None
            }
        }
    }

    fn save_offset(&self, offset: f64) -> Result<(), SettingsError> {
        self.update(|stored| stored.calibration = Some(offset.to_string()))
    }

    fn load_theme(&self) -> ThemePreference {
        self.read().map(|s| s.theme()).unwrap_or_default()
    }

    fn save_theme(&self, theme: ThemePreference) -> Result<(), SettingsError> {
        self.update(|stored| stored.theme = Some(theme.as_str().to_string()))
    }
}
