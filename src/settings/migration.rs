// Legacy settings migration
// Older releases kept their state in a loose JSON file; it is copied into the
// settings store once and ignored afterwards.
use log::info;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::settings::{normalize_volume, SettingsError, SettingsStore};
use crate::sound::import::custom_sound_id;

#[derive(Debug, Default, Deserialize)]
struct LegacySound {
    volume: Option<f64>,
    playing: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LegacySettings {
    volume: Option<f64>,
    playing: Option<bool>,
    #[serde(default)]
    sounds: BTreeMap<String, LegacySound>,
    /// Custom sound name -> file URI
    #[serde(default)]
    audios: BTreeMap<String, String>,
}

/// What a migration run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    NoLegacyFile,
    AlreadyMigrated,
    Migrated { sounds: usize, custom_audios: usize },
}

/// Copy the legacy settings file at `legacy_path` into `store`.
///
/// Runs at most once per store: the `legacy-migrated` marker is written in
/// the same flush as the imported values. A malformed legacy file is an
/// error and is left in place.
pub fn migrate_legacy(
    store: &SettingsStore,
    legacy_path: &Path,
) -> Result<MigrationOutcome, SettingsError> {
    if store.legacy_migrated() {
        return Ok(MigrationOutcome::AlreadyMigrated);
    }
    if !legacy_path.exists() {
        return Ok(MigrationOutcome::NoLegacyFile);
    }

    let content = fs::read_to_string(legacy_path).map_err(|source| SettingsError::LegacyRead {
        path: legacy_path.to_path_buf(),
        source,
    })?;
    let legacy: LegacySettings =
        serde_json::from_str(&content).map_err(|source| SettingsError::Legacy {
            path: legacy_path.to_path_buf(),
            source,
        })?;

    // Legacy custom sounds were keyed by display name
    let renamed: BTreeMap<String, String> = legacy
        .audios
        .iter()
        .map(|(name, uri)| (name.clone(), custom_sound_id(uri)))
        .collect();

    let sound_count = legacy.sounds.len();
    let audio_count = legacy.audios.len();

    store.update(|settings| {
        if let Some(volume) = legacy.volume {
            settings.volume = normalize_volume(volume);
        }
        if let Some(playing) = legacy.playing {
            settings.playing = playing;
        }
        for uri in legacy.audios.values() {
            settings
                .custom_audios
                .insert(custom_sound_id(uri), uri.clone());
        }
        for (name, sound) in &legacy.sounds {
            let id = renamed.get(name).cloned().unwrap_or_else(|| name.clone());
            let entry = settings.sounds.entry(id).or_default();
            if let Some(volume) = sound.volume {
                entry.volume = normalize_volume(volume);
            }
            if let Some(playing) = sound.playing {
                entry.enabled = playing;
            }
        }
        settings.legacy_migrated = true;
    })?;

    info!(
        "[Settings] Migrated legacy settings from {:?} ({} sounds, {} custom audios)",
        legacy_path, sound_count, audio_count
    );
    Ok(MigrationOutcome::Migrated {
        sounds: sound_count,
        custom_audios: audio_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use tempfile::tempdir;

    const LEGACY: &str = r#"{
        "volume": 0.756,
        "playing": true,
        "sounds": {
            "rain": {"volume": 0.3, "playing": true},
            "my-birds": {"volume": 0.9}
        },
        "audios": {"my-birds": "file:///home/user/birds.flac"}
    }"#;

    #[test]
    fn imports_legacy_values() {
        let dir = tempdir().unwrap();
        let legacy = dir.path().join("legacy.json");
        fs::write(&legacy, LEGACY).unwrap();
        let store = SettingsStore::open(&dir.path().join("config")).unwrap();

        let outcome = migrate_legacy(&store, &legacy).unwrap();
        assert_eq!(
            outcome,
            MigrationOutcome::Migrated {
                sounds: 2,
                custom_audios: 1
            }
        );
        assert_eq!(store.volume(), 0.76);
        assert!(store.playing());
        assert!(store.sound("rain").enabled);
        assert_eq!(store.sound("rain").volume, 0.3);

        let birds = custom_sound_id("file:///home/user/birds.flac");
        assert_eq!(
            store.custom_audios().get(&birds).map(String::as_str),
            Some("file:///home/user/birds.flac")
        );
        assert_eq!(store.sound(&birds).volume, 0.9);
        assert!(!store.sound(&birds).enabled);
    }

    #[test]
    fn second_run_is_a_no_op() {
        let dir = tempdir().unwrap();
        let legacy = dir.path().join("legacy.json");
        fs::write(&legacy, LEGACY).unwrap();
        let config = dir.path().join("config");
        let store = SettingsStore::open(&config).unwrap();

        migrate_legacy(&store, &legacy).unwrap();
        let after_first = store.snapshot();
        store.set_sound_volume("rain", 0.8).unwrap();
        let edited = store.snapshot();

        assert_eq!(
            migrate_legacy(&store, &legacy).unwrap(),
            MigrationOutcome::AlreadyMigrated
        );
        assert_eq!(store.snapshot(), edited);
        assert_ne!(after_first, edited);

        // The marker survives a restart
        let reopened = SettingsStore::open(&config).unwrap();
        assert_eq!(
            migrate_legacy(&reopened, &legacy).unwrap(),
            MigrationOutcome::AlreadyMigrated
        );
        assert_eq!(reopened.snapshot(), edited);
    }

    #[test]
    fn missing_legacy_file() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::in_memory(Settings::default());
        assert_eq!(
            migrate_legacy(&store, &dir.path().join("nope.json")).unwrap(),
            MigrationOutcome::NoLegacyFile
        );
        assert_eq!(store.snapshot(), Settings::default());
    }

    #[test]
    fn malformed_legacy_file_propagates() {
        let dir = tempdir().unwrap();
        let legacy = dir.path().join("legacy.json");
        fs::write(&legacy, "{\"volume\": \"loud\"").unwrap();
        let store = SettingsStore::in_memory(Settings::default());
        let err = migrate_legacy(&store, &legacy).unwrap_err();
        assert!(matches!(err, SettingsError::Legacy { .. }));
        assert!(!store.legacy_migrated());
    }
}
