// Custom sound import
// Turns a user-picked audio file into a custom Sound. The file is referenced
// by URI, never copied: if it later moves, the sound stays listed and plays
// silence.
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use super::Sound;

/// A file-chooser filter entry
#[derive(Debug, Clone, Copy)]
pub struct AudioFilter {
    pub name: &'static str,
    pub mime_types: &'static [&'static str],
    pub extensions: &'static [&'static str],
}

/// Audio formats accepted for import
pub const AUDIO_FILTERS: &[AudioFilter] = &[
    AudioFilter {
        name: "OGG",
        mime_types: &["audio/ogg"],
        extensions: &["ogg", "oga"],
    },
    AudioFilter {
        name: "FLAC",
        mime_types: &["audio/x-flac"],
        extensions: &["flac"],
    },
    AudioFilter {
        name: "WAV",
        mime_types: &["audio/x-wav", "audio/wav"],
        extensions: &["wav"],
    },
    AudioFilter {
        name: "MP3",
        mime_types: &["audio/mpeg"],
        extensions: &["mp3"],
    },
];

const CUSTOM_ID_PREFIX: &str = "custom-";

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("{0:?} has no file name")]
    NoFileName(PathBuf),
    #[error("{path:?} is not a supported audio file (OGG, FLAC, WAV or MP3)")]
    Unsupported { path: PathBuf },
    #[error("cannot build a file URI for {path:?}: {source}")]
    Location {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Mime type of an importable file, judged by its extension
pub fn mime_type_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_string_lossy().to_lowercase();
    AUDIO_FILTERS
        .iter()
        .find(|filter| filter.extensions.contains(&extension.as_str()))
        .map(|filter| filter.mime_types[0])
}

/// Display name of a file: its name up to the first `.`
pub fn derive_title(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    let title = name.split('.').next().unwrap_or_default();
    if title.is_empty() {
        return None;
    }
    Some(title.to_string())
}

/// Stable identifier for a custom sound, derived from its location.
/// Importing the same file twice yields the same identifier.
pub fn custom_sound_id(uri: &str) -> String {
    let hash = blake3::hash(uri.as_bytes()).to_hex();
    format!("{}{}", CUSTOM_ID_PREFIX, &hash.as_str()[..16])
}

/// Build a custom sound for the file at `path`.
///
/// The file is not opened: a missing file imports fine and fails later, at
/// playback.
pub fn import_custom_sound(path: &Path) -> Result<Sound, ImportError> {
    let title = derive_title(path).ok_or_else(|| ImportError::NoFileName(path.to_path_buf()))?;
    if mime_type_for(path).is_none() {
        return Err(ImportError::Unsupported {
            path: path.to_path_buf(),
        });
    }

    let absolute = std::path::absolute(path).map_err(|source| ImportError::Location {
        path: path.to_path_buf(),
        source,
    })?;
    let uri = Url::from_file_path(&absolute)
        .map_err(|()| ImportError::Location {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a local path"),
        })?
        .to_string();

    Ok(Sound::custom(custom_sound_id(&uri), title, uri))
}

/// Rebuild a custom sound from its persisted identifier and URI
pub fn sound_from_location(id: &str, uri: &str) -> Sound {
    let title = Url::parse(uri)
        .ok()
        .and_then(|url| url.to_file_path().ok())
        .and_then(|path| derive_title(&path))
        .unwrap_or_else(|| id.to_string());
    Sound::custom(id.to_string(), title, uri.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::{SoundKind, SoundSource};

    #[test]
    fn title_strips_extension() {
        let sound = import_custom_sound(Path::new("/music/forest-rain.ogg")).unwrap();
        assert_eq!(sound.title, "forest-rain");
        assert_eq!(sound.kind, SoundKind::Custom);
        assert!(sound.name.starts_with("custom-"));
        assert!(!sound.enabled);
    }

    #[test]
    fn title_stops_at_the_first_dot() {
        assert_eq!(
            derive_title(Path::new("/a/night.train.flac")).as_deref(),
            Some("night")
        );
        assert_eq!(derive_title(Path::new("/a/.hidden.ogg")), None);
        assert!(matches!(
            import_custom_sound(Path::new("/a/.hidden.ogg")),
            Err(ImportError::NoFileName(_))
        ));
    }

    #[test]
    fn whitelist() {
        assert_eq!(mime_type_for(Path::new("a.OGG")), Some("audio/ogg"));
        assert_eq!(mime_type_for(Path::new("a.flac")), Some("audio/x-flac"));
        assert_eq!(mime_type_for(Path::new("a.wav")), Some("audio/x-wav"));
        assert_eq!(mime_type_for(Path::new("a.mp3")), Some("audio/mpeg"));
        assert_eq!(mime_type_for(Path::new("a.m4a")), None);
        assert_eq!(mime_type_for(Path::new("README")), None);

        let err = import_custom_sound(Path::new("/music/cover.png")).unwrap_err();
        assert!(matches!(err, ImportError::Unsupported { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn location_is_a_file_uri() {
        let sound = import_custom_sound(Path::new("/music/forest rain.ogg")).unwrap();
        assert_eq!(
            sound.source,
            SoundSource::File("file:///music/forest%20rain.ogg".into())
        );
        assert_eq!(sound.name, custom_sound_id("file:///music/forest%20rain.ogg"));
    }

    #[test]
    fn identifiers_follow_location() {
        let a = import_custom_sound(Path::new("/x/birds.ogg")).unwrap();
        let b = import_custom_sound(Path::new("/x/birds.ogg")).unwrap();
        let c = import_custom_sound(Path::new("/y/birds.ogg")).unwrap();
        assert_eq!(a.name, b.name);
        assert_ne!(a.name, c.name);
        assert_eq!(a.title, c.title);
    }

    #[test]
    fn missing_file_still_imports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.wav");
        assert!(!path.exists());
        let sound = import_custom_sound(&path).unwrap();
        assert_eq!(sound.title, "gone");
        assert_eq!(sound.source.resolve(Path::new("/")), Some(path));
    }

    #[cfg(unix)]
    #[test]
    fn rebuild_from_settings() {
        let sound = sound_from_location("custom-1", "file:///music/forest-rain.ogg");
        assert_eq!(sound.title, "forest-rain");
        assert_eq!(sound.name, "custom-1");
        let odd = sound_from_location("custom-2", "not a uri");
        assert_eq!(odd.title, "custom-2");
    }
}
