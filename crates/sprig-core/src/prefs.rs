// ── Preference area ──
//
// Small string key/value store backing device aliases. Persisted as a
// flat JSON object; every write replaces the file atomically.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::CoreError;

#[derive(Debug)]
pub(crate) struct Preferences {
    path: Option<PathBuf>,
    values: Mutex<BTreeMap<String, String>>,
}

impl Preferences {
    pub(crate) fn in_memory() -> Self {
        Self {
            path: None,
            values: Mutex::new(BTreeMap::new()),
        }
    }

    /// Load from `path`. A missing file is an empty area.
    pub(crate) fn load(path: &Path) -> Result<Self, CoreError> {
        let values = match std::fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|e| CoreError::Storage {
                message: format!("corrupt preferences file {}: {e}", path.display()),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), entries = values.len(), "loaded preferences");
        Ok(Self {
            path: Some(path.to_path_buf()),
            values: Mutex::new(values),
        })
    }

    pub(crate) fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    pub(crate) fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        let mut values = self.values.lock();
        let mut next = values.clone();
        next.insert(key.to_owned(), value.to_owned());
        self.persist(&next)?;
        *values = next;
        Ok(())
    }

    /// Remove a key, returning whether it was present.
    pub(crate) fn remove(&self, key: &str) -> Result<bool, CoreError> {
        let mut values = self.values.lock();
        if !values.contains_key(key) {
            return Ok(false);
        }
        let mut next = values.clone();
        next.remove(key);
        self.persist(&next)?;
        *values = next;
        Ok(true)
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), CoreError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(values).map_err(|e| CoreError::Storage {
            message: format!("cannot encode preferences: {e}"),
        })?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn values_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let prefs = Preferences::load(&path).unwrap();
        prefs.set("alias:devA", "Kitchen").unwrap();
        drop(prefs);

        let prefs = Preferences::load(&path).unwrap();
        assert_eq!(prefs.get("alias:devA").as_deref(), Some("Kitchen"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn remove_reports_presence() {
        let prefs = Preferences::in_memory();
        prefs.set("k", "v").unwrap();
        assert!(prefs.remove("k").unwrap());
        assert!(!prefs.remove("k").unwrap());
        assert_eq!(prefs.get("k"), None);
    }

    #[test]
    fn corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = Preferences::load(&path).unwrap_err();
        assert!(err.is_storage());
    }
}
