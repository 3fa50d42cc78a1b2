//! Key-value preference persistence.
//!
//! The area list is stored through this seam so the surrounding application
//! can supply whatever settings store it already uses. [`MemoryStore`] backs
//! tests; [`FilePreferenceStore`] writes one JSON file per key.

use crate::error::ChartError;
use crate::Result;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

/// Injected get/set-by-key string store.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// File-per-key store rooted at a settings directory.
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    dir: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if !self.dir.is_dir() {
            fs::create_dir_all(&self.dir)
                .map_err(|e| ChartError::io("Unable to create settings directory.", &e))?;
        }
        fs::write(self.path_for(key), value)
            .map_err(|e| ChartError::io("Unable to save settings.", &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::default();
        assert!(store.get("areas").is_none());
        store.set("areas", "[]").unwrap();
        assert_eq!(store.get("areas").as_deref(), Some("[]"));
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempdir().unwrap();
        let store = FilePreferenceStore::new(dir.path().join("settings"));
        assert!(store.get("areas").is_none());
        store.set("areas", "{\"a\":1}").unwrap();
        assert_eq!(store.get("areas").as_deref(), Some("{\"a\":1}"));
    }
}
