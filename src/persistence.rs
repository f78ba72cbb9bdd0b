// src/persistence.rs
use serde::{Deserialize, Serialize};
use std::{
    ffi::OsString,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::PayrollSettings;
use crate::settings::{SettingsError, SettingsSlot};
use crate::store::{InMemoryStore, StoreError, StoreSnapshot};

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Data file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Data file JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSnapshot {
    #[serde(flatten)]
    pub store: StoreSnapshot,
    pub settings: Option<PayrollSettings>,
}

/// Loads the store and the settings slot from `path`. A missing file yields empty state.
pub fn load_data_file(path: &Path) -> Result<(InMemoryStore, SettingsSlot), PersistenceError> {
    if !path.exists() {
        info!("Data file {} not found, starting empty.", path.display());
        return Ok((InMemoryStore::new(), SettingsSlot::new()));
    }
    let json_string = fs::read_to_string(path)?;
    let snapshot: DataSnapshot = serde_json::from_str(&json_string)?;
    info!(
        "Data loaded from {}: {} users, {} work-hours rows, {} holidays",
        path.display(),
        snapshot.store.users.len(),
        snapshot.store.work_hours.len(),
        snapshot.store.holidays.len()
    );
    let slot = SettingsSlot::new();
    if let Some(settings) = snapshot.settings {
        slot.create(settings)?;
    }
    Ok((InMemoryStore::from_snapshot(snapshot.store), slot))
}

/// Sibling path the snapshot is written to before it replaces the live file.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("data"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes the snapshot next to `path` and renames it into place, so a failed or
/// interrupted save never truncates the previous file.
pub fn save_data_file(
    path: &Path,
    store: &InMemoryStore,
    settings: &SettingsSlot,
) -> Result<(), PersistenceError> {
    let snapshot = DataSnapshot {
        store: store.snapshot()?,
        settings: settings.get()?,
    };
    let json_string = serde_json::to_string_pretty(&snapshot)?;

    let tmp = temp_path(path);
    let written = File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(json_string.as_bytes())?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&tmp, path));
    if let Err(e) = written {
        warn!("Failed to save data to {}: {}", path.display(), e);
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    info!("Data saved to {}", path.display());
    Ok(())
}
