// Board events forwarded to the webview
use log::warn;
use serde::Serialize;
use tauri::{AppHandle, Emitter};

use crate::board::BoardView;
use crate::sound::Sound;

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SoundAdded<'a> {
    group_id: &'a str,
    sound: &'a Sound,
}

/// Renders the board by emitting events to the frontend
pub struct TauriView {
    app: AppHandle,
}

impl TauriView {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }

    fn emit<S: Serialize + Clone>(&self, event: &str, payload: S) {
        if let Err(e) = self.app.emit(event, payload) {
            warn!("[Events] Failed to emit {}: {}", event, e);
        }
    }
}

impl BoardView for TauriView {
    fn sound_added(&mut self, group_id: &str, sound: &Sound) {
        self.emit("sound-added", SoundAdded { group_id, sound });
    }

    fn sound_removed(&mut self, name: &str) {
        self.emit("sound-removed", name);
    }

    fn sound_changed(&mut self, sound: &Sound) {
        self.emit("sound-changed", sound);
    }

    fn playback_changed(&mut self, playing: bool) {
        self.emit("playback-changed", playing);
    }

    fn master_volume_changed(&mut self, volume: f64) {
        self.emit("volume-changed", volume);
    }
}
