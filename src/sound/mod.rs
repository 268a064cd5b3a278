// Sound entities
// A sound is plain data: the board owns it, the mixer refers to it by name.

pub mod catalog;
pub mod import;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::settings::{normalize_volume, SoundSettings};
use catalog::CatalogEntry;

/// Icon shown for every user-imported sound
pub const CUSTOM_SOUND_ICON: &str = "ambiance-sound-wave-symbolic";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SoundKind {
    BuiltIn,
    Custom,
}

/// Where the audio of a sound lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "location", rename_all = "kebab-case")]
pub enum SoundSource {
    /// Path relative to the bundled resource directory
    Resource(String),
    /// `file://` URI of a user file, referenced in place
    File(String),
}

impl SoundSource {
    /// Resolve to a filesystem path. `None` for URIs that do not name a
    /// local file.
    pub fn resolve(&self, resource_dir: &Path) -> Option<PathBuf> {
        match self {
            SoundSource::Resource(relative) => Some(resource_dir.join(relative)),
            SoundSource::File(_) => self.local_path(),
        }
    }

    /// Path of a user file; bundled sounds have none.
    pub fn local_path(&self) -> Option<PathBuf> {
        match self {
            SoundSource::Resource(_) => None,
            SoundSource::File(uri) => Url::parse(uri).ok()?.to_file_path().ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sound {
    /// Unique identifier, also the settings key
    pub name: String,
    pub title: String,
    pub icon: String,
    pub kind: SoundKind,
    pub source: SoundSource,
    pub enabled: bool,
    pub volume: f64,
}

impl Sound {
    pub fn built_in(entry: &CatalogEntry) -> Self {
        Self {
            name: entry.name.to_string(),
            title: entry.title.to_string(),
            icon: format!("ambiance-{}-symbolic", entry.name),
            kind: SoundKind::BuiltIn,
            source: SoundSource::Resource(catalog::resource_path(entry.name)),
            enabled: false,
            volume: SoundSettings::default().volume,
        }
    }

    pub fn custom(name: String, title: String, uri: String) -> Self {
        Self {
            name,
            title,
            icon: CUSTOM_SOUND_ICON.to_string(),
            kind: SoundKind::Custom,
            source: SoundSource::File(uri),
            enabled: false,
            volume: SoundSettings::default().volume,
        }
    }

    /// Built-ins can only be disabled, never removed
    pub fn is_removable(&self) -> bool {
        self.kind == SoundKind::Custom && !catalog::is_built_in(&self.name)
    }

    pub fn apply_settings(&mut self, settings: SoundSettings) {
        self.enabled = settings.enabled;
        self.volume = normalize_volume(settings.volume);
    }
}

/// A titled list of sounds, as shown in one section of the window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundGroup {
    pub id: String,
    pub title: String,
    pub sounds: Vec<Sound>,
}

impl SoundGroup {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            sounds: Vec::new(),
        }
    }

    pub fn add(&mut self, sound: Sound) {
        self.sounds.push(sound);
    }

    pub fn remove(&mut self, name: &str) -> Option<Sound> {
        let index = self.sounds.iter().position(|s| s.name == name)?;
        Some(self.sounds.remove(index))
    }

    pub fn find(&self, name: &str) -> Option<&Sound> {
        self.sounds.iter().find(|s| s.name == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Sound> {
        self.sounds.iter_mut().find(|s| s.name == name)
    }
}
