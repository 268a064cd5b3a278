// Playback mixer
// Tracks which sounds are enabled, owns one looping handle per enabled sound
// and keeps every handle's gain at volume x master volume.
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::audio::{AudioBackend, LoopHandle};
use crate::settings::{normalize_volume, SettingsError, SettingsStore};
use crate::sound::{Sound, SoundSource};

/// Global playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlaybackState {
    /// Nothing has played yet
    Stopped,
    Playing,
    /// Paused by the user; loops are kept but silent
    Muted,
}

struct Channel {
    source: SoundSource,
    volume: f64,
    enabled: bool,
    handle: Option<Box<dyn LoopHandle>>,
}

pub struct Mixer<B: AudioBackend> {
    backend: B,
    settings: SettingsStore,
    state: PlaybackState,
    master_volume: f64,
    channels: BTreeMap<String, Channel>,
}

impl<B: AudioBackend> Mixer<B> {
    /// Restore the playing flag and master volume from `settings`. No loop
    /// starts until sounds are enabled.
    pub fn new(backend: B, settings: SettingsStore) -> Self {
        let state = if settings.playing() {
            PlaybackState::Playing
        } else {
            PlaybackState::Stopped
        };
        let master_volume = normalize_volume(settings.volume());
        Self {
            backend,
            settings,
            state,
            master_volume,
            channels: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn master_volume(&self) -> f64 {
        self.master_volume
    }

    /// Stored volume of a known sound
    pub fn volume(&self, id: &str) -> Option<f64> {
        self.channels.get(id).map(|c| c.volume)
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.channels.get(id).map_or(false, |c| c.enabled)
    }

    /// Gain the sound is heard at; `None` without an active loop
    pub fn effective_gain(&self, id: &str) -> Option<f32> {
        let channel = self.channels.get(id)?;
        channel.handle.as_ref()?;
        if self.state == PlaybackState::Playing {
            Some(self.gain_for(channel.volume))
        } else {
            Some(0.0)
        }
    }

    /// Identifiers with a live loop handle
    pub fn active_loops(&self) -> Vec<&str> {
        self.channels
            .iter()
            .filter(|(_, c)| c.handle.is_some())
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Play/pause. From Stopped or Muted every enabled sound becomes audible;
    /// from Playing every loop is muted in place.
    ///
    /// Every mutator persists first; on a failed write nothing changes.
    pub fn toggle(&mut self) -> Result<PlaybackState, SettingsError> {
        self.settings.set_playing(!self.is_playing())?;
        match self.state {
            PlaybackState::Playing => {
                for channel in self.channels.values_mut() {
                    if let Some(handle) = channel.handle.as_mut() {
                        handle.set_muted(true);
                    }
                }
                self.state = PlaybackState::Muted;
            }
            PlaybackState::Stopped | PlaybackState::Muted => {
                self.state = PlaybackState::Playing;
                let ids: Vec<String> = self
                    .channels
                    .iter()
                    .filter(|(_, c)| c.enabled)
                    .map(|(id, _)| id.clone())
                    .collect();
                for id in ids {
                    self.resume(&id);
                }
            }
        }
        info!("[Mixer] Playback {:?}", self.state);
        Ok(self.state)
    }

    /// Mark `sound` enabled. A loop starts right away only while Playing.
    pub fn enable(&mut self, sound: &Sound) -> Result<(), SettingsError> {
        self.settings.set_sound_enabled(&sound.name, true)?;
        let channel = self
            .channels
            .entry(sound.name.clone())
            .or_insert_with(|| Channel {
                source: sound.source.clone(),
                volume: normalize_volume(sound.volume),
                enabled: false,
                handle: None,
            });
        channel.source = sound.source.clone();
        channel.enabled = true;

        if self.state == PlaybackState::Playing {
            self.resume(&sound.name);
        }
        Ok(())
    }

    /// Stop and drop the loop of `id`, if any
    pub fn disable(&mut self, id: &str) -> Result<(), SettingsError> {
        self.settings.set_sound_enabled(id, false)?;
        if let Some(channel) = self.channels.get_mut(id) {
            channel.enabled = false;
            if let Some(mut handle) = channel.handle.take() {
                handle.stop();
                debug!("[Mixer] Stopped {}", id);
            }
        }
        Ok(())
    }

    /// Store a sound volume and apply it live. Returns the stored value.
    pub fn set_volume(&mut self, id: &str, volume: f64) -> Result<f64, SettingsError> {
        let volume = normalize_volume(volume);
        self.settings.set_sound_volume(id, volume)?;
        let gain = self.gain_for(volume);
        if let Some(channel) = self.channels.get_mut(id) {
            channel.volume = volume;
            if let Some(handle) = channel.handle.as_mut() {
                handle.set_gain(gain);
            }
        }
        Ok(volume)
    }

    /// Store the master volume and re-apply every loop's gain. Returns the
    /// stored value.
    pub fn set_master_volume(&mut self, volume: f64) -> Result<f64, SettingsError> {
        let master = normalize_volume(volume);
        self.settings.set_volume(master)?;
        self.master_volume = master;
        for channel in self.channels.values_mut() {
            if let Some(handle) = channel.handle.as_mut() {
                handle.set_gain((channel.volume * master) as f32);
            }
        }
        Ok(master)
    }

    /// Drop all state for a sound that no longer exists
    pub fn forget(&mut self, id: &str) {
        if let Some(mut channel) = self.channels.remove(id) {
            if let Some(mut handle) = channel.handle.take() {
                handle.stop();
            }
        }
    }

    fn gain_for(&self, volume: f64) -> f32 {
        (volume * self.master_volume) as f32
    }

    /// Make `id` audible: unmute its loop or start one
    fn resume(&mut self, id: &str) {
        let master = self.master_volume;
        let Some(channel) = self.channels.get_mut(id) else {
            return;
        };
        let gain = (channel.volume * master) as f32;

        if let Some(handle) = channel.handle.as_mut() {
            handle.set_gain(gain);
            handle.set_muted(false);
            return;
        }

        match self.backend.start_loop(id, &channel.source, gain) {
            Ok(handle) => {
                debug!("[Mixer] Started {} at gain {:.2}", id, gain);
                channel.handle = Some(handle);
            }
            Err(e) => warn!("[Mixer] Failed to start {}: {}", id, e),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingBackend;
    use super::*;
    use crate::settings::Settings;
    use crate::sound::catalog::CATALOG;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    fn sound(name: &str) -> Sound {
        let entry = CATALOG
            .iter()
            .flat_map(|g| g.sounds.iter())
            .find(|e| e.name == name)
            .unwrap();
        Sound::built_in(entry)
    }

    fn mixer(settings: Settings) -> (Mixer<RecordingBackend>, RecordingBackend, SettingsStore) {
        let backend = RecordingBackend::default();
        let store = SettingsStore::in_memory(settings);
        (Mixer::new(backend.clone(), store.clone()), backend, store)
    }

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-6, "{} != {}", a, b);
    }

    #[test]
    fn starts_stopped_or_playing_from_settings() {
        let (m, _, _) = mixer(Settings::default());
        assert_eq!(m.state(), PlaybackState::Stopped);
        let (m, _, _) = mixer(Settings {
            playing: true,
            volume: 0.8,
            ..Settings::default()
        });
        assert_eq!(m.state(), PlaybackState::Playing);
        assert_eq!(m.master_volume(), 0.8);
    }

    #[test]
    fn enable_while_stopped_records_but_stays_silent() {
        let (mut m, backend, store) = mixer(Settings::default());
        m.enable(&sound("rain")).unwrap();
        assert!(m.is_enabled("rain"));
        assert!(store.sound("rain").enabled);
        assert_eq!(backend.started(), 0);
        assert_eq!(m.effective_gain("rain"), None);

        m.toggle().unwrap();
        assert_eq!(m.state(), PlaybackState::Playing);
        assert!(store.playing());
        assert_eq!(backend.live_for("rain").len(), 1);
    }

    #[test]
    fn enable_while_playing_starts_one_loop_at_effective_gain() {
        let (mut m, backend, _) = mixer(Settings {
            playing: true,
            volume: 0.5,
            ..Settings::default()
        });
        let mut rain = sound("rain");
        rain.volume = 0.8;
        m.enable(&rain).unwrap();
        m.enable(&rain).unwrap();

        let live = backend.live_for("rain");
        assert_eq!(live.len(), 1);
        assert_close(live[0].gain, 0.4);
        assert_eq!(m.effective_gain("rain"), Some(0.4));
    }

    #[test]
    fn toggle_mutes_in_place_and_back() {
        let (mut m, backend, store) = mixer(Settings {
            playing: true,
            ..Settings::default()
        });
        m.enable(&sound("rain")).unwrap();
        m.enable(&sound("wind")).unwrap();

        assert_eq!(m.toggle().unwrap(), PlaybackState::Muted);
        assert!(!store.playing());
        assert!(backend.live().iter().all(|l| l.muted));
        assert_eq!(backend.live().len(), 2);
        assert_eq!(m.effective_gain("rain"), Some(0.0));

        assert_eq!(m.toggle().unwrap(), PlaybackState::Playing);
        assert!(backend.live().iter().all(|l| !l.muted));
        assert_eq!(backend.started(), 2);
    }

    #[test]
    fn enable_while_muted_starts_on_resume() {
        let (mut m, backend, _) = mixer(Settings {
            playing: true,
            ..Settings::default()
        });
        m.toggle().unwrap();
        m.enable(&sound("storm")).unwrap();
        assert_eq!(backend.started(), 0);
        m.toggle().unwrap();
        assert_eq!(backend.live_for("storm").len(), 1);
    }

    #[test]
    fn disable_removes_the_loop_and_reenable_recreates_one() {
        let (mut m, backend, store) = mixer(Settings {
            playing: true,
            ..Settings::default()
        });
        m.enable(&sound("fireplace")).unwrap();
        m.disable("fireplace").unwrap();
        assert!(backend.live_for("fireplace").is_empty());
        assert!(!m.active_loops().contains(&"fireplace"));
        assert!(!store.sound("fireplace").enabled);

        m.enable(&sound("fireplace")).unwrap();
        assert_eq!(backend.live_for("fireplace").len(), 1);
        assert_eq!(m.active_loops(), vec!["fireplace"]);
    }

    #[test]
    fn operations_on_inactive_sounds_are_no_ops() {
        let (mut m, backend, store) = mixer(Settings::default());
        m.disable("rain").unwrap();
        assert_eq!(m.set_volume("rain", 0.25).unwrap(), 0.25);
        assert_eq!(store.sound("rain").volume, 0.25);
        assert_eq!(backend.started(), 0);
        m.forget("nothing");
    }

    #[test]
    fn volumes_are_clamped_and_rounded() {
        let (mut m, _, store) = mixer(Settings::default());
        assert_eq!(m.set_master_volume(1.5).unwrap(), 1.0);
        assert_eq!(m.set_master_volume(0.126).unwrap(), 0.13);
        assert_eq!(store.volume(), 0.13);
        m.enable(&sound("rain")).unwrap();
        assert_eq!(m.set_volume("rain", -2.0).unwrap(), 0.0);
        assert_eq!(m.volume("rain"), Some(0.0));
    }

    #[test]
    fn master_volume_reapplies_every_gain() {
        let (mut m, backend, _) = mixer(Settings {
            playing: true,
            ..Settings::default()
        });
        m.enable(&sound("rain")).unwrap();
        m.enable(&sound("wind")).unwrap();
        m.set_volume("rain", 0.6).unwrap();
        m.set_volume("wind", 0.2).unwrap();
        m.set_master_volume(0.5).unwrap();

        for l in backend.live() {
            let volume = m.volume(&l.id).unwrap();
            assert_close(l.gain, (volume * 0.5) as f32);
        }
    }

    #[test]
    fn backend_failure_leaves_no_handle() {
        let backend = RecordingBackend {
            fail: true,
            ..RecordingBackend::default()
        };
        let store = SettingsStore::in_memory(Settings {
            playing: true,
            ..Settings::default()
        });
        let mut m = Mixer::new(backend, store.clone());
        m.enable(&sound("rain")).unwrap();
        assert!(m.active_loops().is_empty());
        assert!(store.sound("rain").enabled);
    }

    #[test]
    fn forget_stops_and_drops() {
        let (mut m, backend, _) = mixer(Settings {
            playing: true,
            ..Settings::default()
        });
        m.enable(&sound("rain")).unwrap();
        m.forget("rain");
        assert!(backend.live().is_empty());
        assert_eq!(m.volume("rain"), None);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Toggle,
        Enable(usize),
        Disable(usize),
        Volume(usize, f64),
        Master(f64),
    }

    const NAMES: [&str; 3] = ["rain", "wind", "fireplace"];

    impl Arbitrary for Op {
        fn arbitrary(g: &mut Gen) -> Self {
            let idx = usize::arbitrary(g) % NAMES.len();
            let v = f64::from(u16::arbitrary(g) % 300) / 200.0 - 0.25;
            match u8::arbitrary(g) % 5 {
                0 => Op::Toggle,
                1 => Op::Enable(idx),
                2 => Op::Disable(idx),
                3 => Op::Volume(idx, v),
                _ => Op::Master(v),
            }
        }
    }

    #[quickcheck]
    fn gains_track_volume_times_master(ops: Vec<Op>) -> bool {
        let (mut m, backend, store) = mixer(Settings::default());
        for op in ops {
            match op {
                Op::Toggle => {
                    m.toggle().unwrap();
                }
                Op::Enable(i) => {
                    let mut s = sound(NAMES[i]);
                    s.volume = store.sound(NAMES[i]).volume;
                    m.enable(&s).unwrap();
                }
                Op::Disable(i) => m.disable(NAMES[i]).unwrap(),
                Op::Volume(i, v) => {
                    m.set_volume(NAMES[i], v).unwrap();
                }
                Op::Master(v) => {
                    m.set_master_volume(v).unwrap();
                }
            }
        }

        let live = backend.live();
        // One loop per enabled sound that has been heard
        let one_each = NAMES.iter().all(|n| {
            let loops = backend.live_for(n).len();
            loops <= 1 && (m.is_enabled(n) || loops == 0)
        });
        let gains = live.iter().all(|l| {
            let expected = (store.sound(&l.id).volume * store.volume()) as f32;
            (l.gain - expected).abs() < 1e-6 && l.muted == !m.is_playing()
        });
        let stored = NAMES
            .iter()
            .all(|n| m.volume(n).map_or(true, |v| v == store.sound(n).volume));
        one_each && gains && stored
    }

    #[quickcheck]
    fn toggle_twice_restores_audibility(enabled: Vec<bool>) -> bool {
        let (mut m, backend, _) = mixer(Settings {
            playing: true,
            ..Settings::default()
        });
        for (name, on) in NAMES.iter().zip(enabled) {
            if on {
                m.enable(&sound(name)).unwrap();
            }
        }
        let before = backend.live();
        m.toggle().unwrap();
        m.toggle().unwrap();
        backend.live() == before && m.is_playing()
    }

    #[test]
    fn failed_writes_leave_the_mixer_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = Settings::get_settings_path(dir.path());
        Settings {
            playing: true,
            ..Settings::default()
        }
        .save(&path)
        .unwrap();
        let store = SettingsStore::open(dir.path()).unwrap();
        let backend = RecordingBackend::default();
        let mut m = Mixer::new(backend.clone(), store.clone());
        m.enable(&sound("wind")).unwrap();

        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(m.enable(&sound("rain")).is_err());
        assert!(!m.is_enabled("rain"));
        assert!(backend.live_for("rain").is_empty());

        assert!(m.disable("wind").is_err());
        assert!(m.is_enabled("wind"));
        assert_eq!(backend.live_for("wind").len(), 1);

        assert!(m.set_volume("wind", 0.9).is_err());
        assert_eq!(m.volume("wind"), Some(0.5));
        assert!(m.set_master_volume(0.2).is_err());
        assert_eq!(m.master_volume(), 1.0);
        assert_close(backend.live_for("wind")[0].gain, 0.5);

        assert!(m.toggle().is_err());
        assert_eq!(m.state(), PlaybackState::Playing);
        assert!(!backend.live_for("wind")[0].muted);
    }
}
