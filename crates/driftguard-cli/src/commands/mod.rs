pub mod classify;
pub mod config;
pub mod evaluate;
pub mod progress;
pub mod streak;

use driftguard_core::{AttentionEngine, SqliteStore, UserSettings};

/// Open the engine over the on-disk store and the saved settings.
pub fn open_engine() -> Result<AttentionEngine, Box<dyn std::error::Error>> {
    let store = SqliteStore::open()?;
    let settings = UserSettings::load()?;
    Ok(AttentionEngine::new(Box::new(store), settings))
}
