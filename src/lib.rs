// Ambiance - Desktop Ambient Sound Mixer
// Module declarations
pub mod audio;
pub mod board;
pub mod mixer;
pub mod settings;
pub mod sound;

#[cfg(feature = "desktop")]
mod commands;
#[cfg(feature = "desktop")]
mod events;
#[cfg(feature = "desktop")]
mod state;

#[cfg(feature = "desktop")]
use log::{error, info};
#[cfg(feature = "desktop")]
use state::AppState;
#[cfg(feature = "desktop")]
use tauri::menu::{Menu, MenuItem};
#[cfg(feature = "desktop")]
use tauri::{AppHandle, Manager, WindowEvent};

#[cfg(feature = "desktop")]
const MAIN_WINDOW: &str = "main";
#[cfg(feature = "desktop")]
const TRAY_ID: &str = "main";

#[cfg(feature = "desktop")]
fn show_main_window(app: &AppHandle) {
    if let Some(window) = app.get_webview_window(MAIN_WINDOW) {
        let _ = window.show();
        let _ = window.set_focus();
    }
}

#[cfg(feature = "desktop")]
fn build_tray_menu(app: &AppHandle) -> tauri::Result<()> {
    let show = MenuItem::with_id(app, "show", "Show Ambiance", true, None::<&str>)?;
    let toggle = MenuItem::with_id(app, "toggle", "Play / Pause", true, None::<&str>)?;
    let quit = MenuItem::with_id(app, "quit", "Quit", true, None::<&str>)?;
    let menu = Menu::with_items(app, &[&show, &toggle, &quit])?;

    if let Some(tray) = app.tray_by_id(TRAY_ID) {
        tray.set_menu(Some(menu))?;
    }
    Ok(())
}

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            let app_state = AppState::initialize(app.handle())?;
            app.manage(app_state);

            if let Err(e) = build_tray_menu(app.handle()) {
                error!("[Tray] Failed to build menu: {}", e);
            }

            info!("[App] Ready");
            Ok(())
        })
        .on_menu_event(|app, event| match event.id.as_ref() {
            "show" => show_main_window(app),
            "toggle" => {
                let state = app.state::<AppState>();
                let mut board = state.board.lock();
                if let Err(e) = board.toggle_playback() {
                    error!("[Tray] Failed to toggle playback: {}", e);
                }
            }
            "quit" => app.exit(0),
            _ => {}
        })
        .on_window_event(|window, event| {
            if let WindowEvent::CloseRequested { api, .. } = event {
                let state = window.state::<AppState>();
                if state.settings.background_playback() {
                    api.prevent_close();
                    let _ = window.hide();
                }
            }
        })
        .invoke_handler(tauri::generate_handler![
            commands::get_board,
            commands::toggle_playback,
            commands::set_sound_enabled,
            commands::set_sound_volume,
            commands::set_master_volume,
            commands::set_background_playback,
            commands::open_custom_sound,
            commands::add_custom_sound,
            commands::remove_custom_sound,
            commands::reveal_custom_sound,
            commands::quit,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
