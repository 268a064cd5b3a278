// Tauri command handlers
use log::{error, warn};
use std::path::PathBuf;
use tauri::{AppHandle, Emitter, Manager, State};
use tauri_plugin_dialog::DialogExt;

use crate::board::BoardSnapshot;
use crate::sound::import::AUDIO_FILTERS;
use crate::sound::Sound;
use crate::state::AppState;

#[tauri::command]
pub fn get_board(state: State<'_, AppState>) -> Result<BoardSnapshot, String> {
    Ok(state.board.lock().snapshot())
}

#[tauri::command]
pub fn toggle_playback(state: State<'_, AppState>) -> Result<bool, String> {
    state
        .board
        .lock()
        .toggle_playback()
        .map_err(|e| format!("Failed to toggle playback: {}", e))
}

#[tauri::command]
pub fn set_sound_enabled(
    name: String,
    enabled: bool,
    state: State<'_, AppState>,
) -> Result<(), String> {
    state
        .board
        .lock()
        .set_enabled(&name, enabled)
        .map_err(|e| format!("Failed to update {}: {}", name, e))
}

#[tauri::command]
pub fn set_sound_volume(
    name: String,
    volume: f64,
    state: State<'_, AppState>,
) -> Result<f64, String> {
    state
        .board
        .lock()
        .set_volume(&name, volume)
        .map_err(|e| format!("Failed to set volume of {}: {}", name, e))
}

#[tauri::command]
pub fn set_master_volume(volume: f64, state: State<'_, AppState>) -> Result<f64, String> {
    state
        .board
        .lock()
        .set_master_volume(volume)
        .map_err(|e| format!("Failed to set volume: {}", e))
}

#[tauri::command]
pub fn set_background_playback(enabled: bool, state: State<'_, AppState>) -> Result<(), String> {
    state
        .board
        .lock()
        .set_background_playback(enabled)
        .map_err(|e| format!("Failed to save setting: {}", e))
}

// ===== Custom Sounds =====

/// Show the native file chooser. The picked file is added in the dialog
/// callback and reported through the `sound-added` event.
#[tauri::command]
pub fn open_custom_sound(app: AppHandle) {
    let mut dialog = app.dialog().file().set_title("Open audio");
    for filter in AUDIO_FILTERS {
        dialog = dialog.add_filter(filter.name, filter.extensions);
    }

    let handle = app.clone();
    dialog.pick_file(move |picked| {
        let Some(picked) = picked else {
            return;
        };
        let result = picked
            .into_path()
            .map_err(|e| format!("Invalid file selection: {}", e))
            .and_then(|path| {
                let state = handle.state::<AppState>();
                let mut board = state.board.lock();
                board
                    .add_custom(&path)
                    .map_err(|e| format!("Failed to add sound: {}", e))
            });
        if let Err(e) = result {
            error!("[Commands] {}", e);
            if let Err(emit_err) = handle.emit("import-failed", e) {
                warn!("[Commands] Failed to emit import-failed: {}", emit_err);
            }
        }
    });
}

#[tauri::command]
pub fn add_custom_sound(path: String, state: State<'_, AppState>) -> Result<Sound, String> {
    state
        .board
        .lock()
        .add_custom(&PathBuf::from(&path))
        .map_err(|e| format!("Failed to add {}: {}", path, e))
}

#[tauri::command]
pub fn remove_custom_sound(name: String, state: State<'_, AppState>) -> Result<(), String> {
    state
        .board
        .lock()
        .remove_custom(&name)
        .map(|_| ())
        .map_err(|e| format!("Failed to remove {}: {}", name, e))
}

/// Open the file manager at a custom sound's file
#[tauri::command]
pub fn reveal_custom_sound(name: String, state: State<'_, AppState>) -> Result<(), String> {
    let path = {
        let board = state.board.lock();
        let sound = board
            .sound(&name)
            .ok_or_else(|| format!("Unknown sound: {}", name))?;
        sound.source.local_path()
    };
    let path = path.ok_or_else(|| format!("{} has no local file", name))?;
    tauri_plugin_opener::reveal_item_in_dir(&path)
        .map_err(|e| format!("Failed to reveal {}: {}", path.display(), e))
}

#[tauri::command]
pub fn quit(app: AppHandle) {
    app.exit(0);
}
