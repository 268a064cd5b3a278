// Soundboard
// Sound groups as plain data, plus the glue that forwards user actions to
// the mixer and settings store and reports the result to a view.
use log::info;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

use crate::audio::AudioBackend;
use crate::mixer::{Mixer, PlaybackState};
use crate::settings::{SettingsError, SettingsStore};
use crate::sound::catalog::{CATALOG, CUSTOM_GROUP_ID, CUSTOM_GROUP_TITLE};
use crate::sound::import::{import_custom_sound, sound_from_location, ImportError};
use crate::sound::{Sound, SoundGroup, SoundSource};

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("unknown sound: {0}")]
    UnknownSound(String),
    #[error("sound {0} is built in and cannot be removed")]
    NotRemovable(String),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Rendering side of the board. Every method defaults to doing nothing.
pub trait BoardView: Send {
    fn sound_added(&mut self, _group_id: &str, _sound: &Sound) {}
    fn sound_removed(&mut self, _name: &str) {}
    fn sound_changed(&mut self, _sound: &Sound) {}
    fn playback_changed(&mut self, _playing: bool) {}
    fn master_volume_changed(&mut self, _volume: f64) {}
}

/// View that renders nothing
pub struct NullView;

impl BoardView for NullView {}

/// Everything the window needs to draw itself
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    pub playing: bool,
    pub state: PlaybackState,
    pub volume: f64,
    pub background_playback: bool,
    pub groups: Vec<SoundGroup>,
}

pub struct Soundboard<B: AudioBackend> {
    groups: Vec<SoundGroup>,
    mixer: Mixer<B>,
    settings: SettingsStore,
    view: Box<dyn BoardView>,
}

impl<B: AudioBackend> Soundboard<B> {
    /// Build the built-in groups and the custom group from `settings`, and
    /// bring the mixer back to its persisted state.
    pub fn load(
        settings: SettingsStore,
        backend: B,
        view: Box<dyn BoardView>,
    ) -> Result<Self, BoardError> {
        let mut groups: Vec<SoundGroup> = CATALOG
            .iter()
            .map(|entry| {
                let mut group = SoundGroup::new(entry.id, entry.title);
                for sound in entry.sounds {
                    group.add(Sound::built_in(sound));
                }
                group
            })
            .collect();

        let mut custom = SoundGroup::new(CUSTOM_GROUP_ID, CUSTOM_GROUP_TITLE);
        for (id, uri) in settings.custom_audios() {
            custom.add(sound_from_location(&id, &uri));
        }
        groups.push(custom);

        let mut mixer = Mixer::new(backend, settings.clone());
        for sound in groups.iter_mut().flat_map(|g| g.sounds.iter_mut()) {
            sound.apply_settings(settings.sound(&sound.name));
            if sound.enabled {
                mixer.enable(sound)?;
            }
        }

        info!(
            "[Board] Loaded {} sounds in {} groups",
            groups.iter().map(|g| g.sounds.len()).sum::<usize>(),
            groups.len()
        );
        Ok(Self {
            groups,
            mixer,
            settings,
            view,
        })
    }

    pub fn groups(&self) -> &[SoundGroup] {
        &self.groups
    }

    pub fn mixer(&self) -> &Mixer<B> {
        &self.mixer
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn sound(&self, name: &str) -> Option<&Sound> {
        self.groups.iter().find_map(|g| g.find(name))
    }

    fn sound_mut(&mut self, name: &str) -> Result<&mut Sound, BoardError> {
        self.groups
            .iter_mut()
            .find_map(|g| g.find_mut(name))
            .ok_or_else(|| BoardError::UnknownSound(name.to_string()))
    }

    fn custom_group(&mut self) -> &mut SoundGroup {
        if let Some(index) = self.groups.iter().position(|g| g.id == CUSTOM_GROUP_ID) {
            return &mut self.groups[index];
        }
        self.groups
            .push(SoundGroup::new(CUSTOM_GROUP_ID, CUSTOM_GROUP_TITLE));
        let last = self.groups.len() - 1;
        &mut self.groups[last]
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            playing: self.mixer.is_playing(),
            state: self.mixer.state(),
            volume: self.mixer.master_volume(),
            background_playback: self.settings.background_playback(),
            groups: self.groups.clone(),
        }
    }

    /// Global play/pause. Returns whether sounds are now audible.
    pub fn toggle_playback(&mut self) -> Result<bool, BoardError> {
        self.mixer.toggle()?;
        let playing = self.mixer.is_playing();
        self.view.playback_changed(playing);
        Ok(playing)
    }

    /// The board only changes once the mixer has persisted the new state
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), BoardError> {
        let mut sound = self.sound_mut(name)?.clone();
        sound.enabled = enabled;

        if enabled {
            self.mixer.enable(&sound)?;
        } else {
            self.mixer.disable(name)?;
        }
        self.sound_mut(name)?.enabled = enabled;
        self.view.sound_changed(&sound);
        Ok(())
    }

    /// Returns the stored (clamped, rounded) volume
    pub fn set_volume(&mut self, name: &str, volume: f64) -> Result<f64, BoardError> {
        self.sound_mut(name)?;
        let volume = self.mixer.set_volume(name, volume)?;
        let sound = self.sound_mut(name)?;
        sound.volume = volume;
        let sound = sound.clone();
        self.view.sound_changed(&sound);
        Ok(volume)
    }

    /// Returns the stored (clamped, rounded) volume
    pub fn set_master_volume(&mut self, volume: f64) -> Result<f64, BoardError> {
        let volume = self.mixer.set_master_volume(volume)?;
        self.view.master_volume_changed(volume);
        Ok(volume)
    }

    pub fn set_background_playback(&mut self, enabled: bool) -> Result<(), BoardError> {
        self.settings.set_background_playback(enabled)?;
        Ok(())
    }

    /// Import `path` as a custom sound. The settings entry is written before
    /// this returns. Importing a file that is already on the board returns
    /// the existing sound.
    pub fn add_custom(&mut self, path: &Path) -> Result<Sound, BoardError> {
        let sound = import_custom_sound(path)?;
        if let Some(existing) = self.sound(&sound.name) {
            return Ok(existing.clone());
        }

        if let SoundSource::File(uri) = &sound.source {
            self.settings.add_custom_audio(&sound.name, uri)?;
        }
        self.custom_group().add(sound.clone());
        self.view.sound_added(CUSTOM_GROUP_ID, &sound);
        info!("[Board] Added custom sound {} ({})", sound.title, sound.name);
        Ok(sound)
    }

    /// Remove a custom sound from the board, the mixer and the settings
    pub fn remove_custom(&mut self, name: &str) -> Result<Sound, BoardError> {
        let sound = self
            .sound(name)
            .ok_or_else(|| BoardError::UnknownSound(name.to_string()))?;
        if !sound.is_removable() {
            return Err(BoardError::NotRemovable(name.to_string()));
        }

        self.settings.remove_custom_audio(name)?;
        self.mixer.forget(name);
        let removed = self
            .custom_group()
            .remove(name)
            .ok_or_else(|| BoardError::UnknownSound(name.to_string()))?;
        self.view.sound_removed(name);
        info!("[Board] Removed custom sound {}", name);
        Ok(removed)
    }
}
