use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{PlaygroundError, Result};

/// Root directory for all persisted playground data.
pub fn data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".alexr-code"))
}

fn key_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

/// Read a stored value by key. Missing files and unparseable content both
/// read as `None`: the store fails open, corruption is treated as absence.
pub fn read_key<T: DeserializeOwned>(key: &str) -> Option<T> {
    read_key_in(&data_dir()?, key)
}

pub fn read_key_in<T: DeserializeOwned>(dir: &Path, key: &str) -> Option<T> {
    let content = std::fs::read_to_string(key_path(dir, key)).ok()?;
    serde_json::from_str(&content).ok()
}

/// Overwrite the stored value for a key in full. There are no partial
/// updates at this layer; callers read, mutate in memory, write back.
pub fn write_key<T: Serialize>(key: &str, value: &T) -> Result<()> {
    let dir = data_dir()
        .ok_or_else(|| PlaygroundError::Custom("Cannot find home directory".into()))?;
    write_key_in(&dir, key, value)
}

pub fn write_key_in<T: Serialize>(dir: &Path, key: &str, value: &T) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| PlaygroundError::Custom(e.to_string()))?;
    std::fs::write(key_path(dir, key), json)?;
    Ok(())
}
