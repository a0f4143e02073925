pub mod locations;
pub mod settings;

use anyhow::Result;
use chrono::{Local, TimeZone};
use std::path::{Path, PathBuf};

use stillwatch_core::config;
use stillwatch_storage::{
    KvStore, LocationStore, SettingsStore, LOCATIONS_NAMESPACE, SETTINGS_NAMESPACE,
};

/// The daemon's socket, when one looks to be running.
pub(crate) fn daemon_socket(data_dir: &Path) -> Option<PathBuf> {
    let sock = config::sock_path(data_dir);
    sock.exists().then_some(sock)
}

/// Open the settings store directly. Only valid while no daemon is running;
/// the daemon owns the stores for the lifetime of its process.
pub(crate) fn open_settings(data_dir: &Path) -> Result<SettingsStore> {
    Ok(SettingsStore::load(KvStore::open(
        data_dir,
        SETTINGS_NAMESPACE,
    )?))
}

/// Open the location store directly. Same caveat as [`open_settings`].
pub(crate) fn open_locations(data_dir: &Path) -> Result<LocationStore> {
    Ok(LocationStore::load(KvStore::open(
        data_dir,
        LOCATIONS_NAMESPACE,
    )?))
}

/// Format a millisecond Unix timestamp in local time.
pub(crate) fn format_timestamp(timestamp_ms: i64) -> String {
    Local.timestamp_millis_opt(timestamp_ms).single().map_or_else(
        || "invalid timestamp".to_string(),
        |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}
