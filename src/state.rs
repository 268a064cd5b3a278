// Application state management
use anyhow::{Context, Result};
use log::{error, info};
use parking_lot::Mutex;
use tauri::{AppHandle, Manager};

use crate::audio::{AudioOutput, MixBus, OutputFormat};
use crate::board::Soundboard;
use crate::events::TauriView;
use crate::settings::{migrate_legacy, SettingsStore};

/// Directory of the legacy settings file, under the user config dir
const LEGACY_DIR: &str = "ambiance";

pub struct AppState {
    pub board: Mutex<Soundboard<MixBus>>,
    pub settings: SettingsStore,
    /// Keeps the device stream alive; `None` when no device could be opened
    _output: Option<AudioOutput>,
}

impl AppState {
    pub fn initialize(app: &AppHandle) -> Result<Self> {
        let app_dir = app
            .path()
            .app_config_dir()
            .context("Failed to get app config directory")?;

        let settings = SettingsStore::open(&app_dir).context("Failed to load settings")?;

        let legacy_path = app
            .path()
            .config_dir()
            .context("Failed to get user config directory")?
            .join(LEGACY_DIR)
            .join("settings.json");
        let outcome = migrate_legacy(&settings, &legacy_path)
            .context("Failed to migrate legacy settings")?;
        info!("[Settings] Legacy migration: {:?}", outcome);

        let resource_dir = app
            .path()
            .resource_dir()
            .context("Failed to get resource directory")?;

        // Without a device the app still works, it is just silent
        let output = match AudioOutput::start(resource_dir.clone()) {
            Ok(output) => Some(output),
            Err(e) => {
                error!("[Audio] Failed to open output device: {}", e);
                None
            }
        };
        let bus = output
            .as_ref()
            .map(AudioOutput::bus)
            .unwrap_or_else(|| MixBus::new(OutputFormat::default(), resource_dir));

        let view = Box::new(TauriView::new(app.clone()));
        let board =
            Soundboard::load(settings.clone(), bus, view).context("Failed to load sounds")?;

        Ok(Self {
            board: Mutex::new(board),
            settings,
            _output: output,
        })
    }
}
