// Settings module
// Persisted user state and the one-time import of the legacy settings file

pub mod migration;
#[allow(clippy::module_inception)]
pub mod settings;

pub use migration::{migrate_legacy, MigrationOutcome};
pub use settings::{normalize_volume, Settings, SettingsError, SettingsStore, SoundSettings};
