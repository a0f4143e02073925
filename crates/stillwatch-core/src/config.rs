use anyhow::Result;
use std::path::{Path, PathBuf};

/// Get the local data directory for stillwatch.
///
/// # Errors
///
/// Returns an error if the local data directory cannot be determined.
pub fn get_data_dir() -> Result<PathBuf> {
    let mut path =
        dirs::data_local_dir().ok_or_else(|| anyhow::anyhow!("Failed to get local data dir"))?;
    path.push("stillwatch");
    Ok(path)
}

/// PID file recording the detached daemon process.
#[must_use]
pub fn pid_path(data_dir: &Path) -> PathBuf {
    data_dir.join("stillwatch.pid")
}

/// Unix socket the daemon serves IPC on.
#[must_use]
pub fn sock_path(data_dir: &Path) -> PathBuf {
    data_dir.join("stillwatch.sock")
}

/// Log file the detached daemon writes to.
#[must_use]
pub fn log_path(data_dir: &Path) -> PathBuf {
    data_dir.join("stillwatch.log")
}
