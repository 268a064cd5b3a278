// Settings management and persistence
// One JSON document per user, flushed on every mutation
use log::{debug, info};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// File name of the settings document inside the app config dir
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Volume a sound gets the first time it is seen
pub const DEFAULT_SOUND_VOLUME: f64 = 0.5;

/// Master volume on first launch
pub const DEFAULT_MASTER_VOLUME: f64 = 1.0;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write settings file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to read legacy settings file {path}: {source}")]
    LegacyRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed legacy settings file {path}: {source}")]
    Legacy {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Clamp a volume to [0, 1] and round it to two decimals.
/// Non-finite input is treated as silence.
pub fn normalize_volume(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

/// Persisted state of a single sound
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundSettings {
    pub enabled: bool,
    pub volume: f64,
}

impl Default for SoundSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            volume: DEFAULT_SOUND_VOLUME,
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    pub playing: bool,
    pub volume: f64,
    pub background_playback: bool,
    pub sounds: BTreeMap<String, SoundSettings>,
    /// Custom sound identifier -> file URI
    pub custom_audios: BTreeMap<String, String>,
    pub legacy_migrated: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            playing: false,
            volume: DEFAULT_MASTER_VOLUME,
            background_playback: true,
            sounds: BTreeMap::new(),
            custom_audios: BTreeMap::new(),
            legacy_migrated: false,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn get_settings_path(app_dir: &Path) -> PathBuf {
        app_dir.join(SETTINGS_FILE_NAME)
    }

    /// Load settings from file, or return defaults if file doesn't exist
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            info!("[Settings] No settings file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let settings: Settings =
            serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        info!("[Settings] Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to file
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| SettingsError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }

        let content = serde_json::to_string_pretty(self).map_err(SettingsError::Serialize)?;

        fs::write(path, content).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("[Settings] Saved settings to {:?}", path);
        Ok(())
    }
}

/// Shared handle to the settings document.
///
/// Every component that persists state receives a clone of this handle.
/// Mutations are written through to disk before the call returns, so the
/// file never lags behind the UI. An in-memory store has no backing file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    inner: Arc<Mutex<Settings>>,
    path: Option<PathBuf>,
}

impl SettingsStore {
    /// Open (or create on first write) the settings document in `app_dir`
    pub fn open(app_dir: &Path) -> Result<Self, SettingsError> {
        let path = Settings::get_settings_path(app_dir);
        let settings = Settings::load(&path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(settings)),
            path: Some(path),
        })
    }

    pub fn in_memory(settings: Settings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(settings)),
            path: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Copy of the whole document
    pub fn snapshot(&self) -> Settings {
        self.inner.lock().clone()
    }

    /// Apply `f` and flush the result. Nothing is written when `f` leaves
    /// the document unchanged.
    pub fn update<F>(&self, f: F) -> Result<(), SettingsError>
    where
        F: FnOnce(&mut Settings),
    {
        let mut settings = self.inner.lock();
        let before = settings.clone();
        f(&mut settings);
        if *settings == before {
            return Ok(());
        }
        match &self.path {
            Some(path) => settings.save(path).map_err(|e| {
                *settings = before;
                e
            }),
            None => Ok(()),
        }
    }

    pub fn playing(&self) -> bool {
        self.inner.lock().playing
    }

    pub fn set_playing(&self, playing: bool) -> Result<(), SettingsError> {
        self.update(|s| s.playing = playing)
    }

    pub fn volume(&self) -> f64 {
        self.inner.lock().volume
    }

    pub fn set_volume(&self, volume: f64) -> Result<(), SettingsError> {
        let volume = normalize_volume(volume);
        self.update(|s| s.volume = volume)
    }

    pub fn background_playback(&self) -> bool {
        self.inner.lock().background_playback
    }

    pub fn set_background_playback(&self, enabled: bool) -> Result<(), SettingsError> {
        self.update(|s| s.background_playback = enabled)
    }

    /// Persisted state of a sound, defaults when never touched
    pub fn sound(&self, id: &str) -> SoundSettings {
        self.inner.lock().sounds.get(id).copied().unwrap_or_default()
    }

    pub fn set_sound_enabled(&self, id: &str, enabled: bool) -> Result<(), SettingsError> {
        self.update(|s| s.sounds.entry(id.to_string()).or_default().enabled = enabled)
    }

    pub fn set_sound_volume(&self, id: &str, volume: f64) -> Result<(), SettingsError> {
        let volume = normalize_volume(volume);
        self.update(|s| s.sounds.entry(id.to_string()).or_default().volume = volume)
    }

    pub fn custom_audios(&self) -> BTreeMap<String, String> {
        self.inner.lock().custom_audios.clone()
    }

    pub fn add_custom_audio(&self, id: &str, uri: &str) -> Result<(), SettingsError> {
        self.update(|s| {
            s.custom_audios.insert(id.to_string(), uri.to_string());
        })
    }

    /// Forget a custom sound together with its per-sound state
    pub fn remove_custom_audio(&self, id: &str) -> Result<(), SettingsError> {
        self.update(|s| {
            s.custom_audios.remove(id);
            s.sounds.remove(id);
        })
    }

    pub fn legacy_migrated(&self) -> bool {
        self.inner.lock().legacy_migrated
    }
}
