use crate::{CommonError, CommonResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Key/value storage for locally persisted editor state
///
/// Stands in for browser local storage: last writer wins per key and there
/// is no cross-process coordination.
pub trait SnapshotStore: Send + Sync {
    /// Read a value, `None` if the key was never written
    fn load(&self, key: &str) -> CommonResult<Option<String>>;

    /// Write (or overwrite) a value
    fn store(&self, key: &str, value: &str) -> CommonResult<()>;

    /// Remove a value; removing a missing key is not an error
    fn remove(&self, key: &str) -> CommonResult<()>;
}

/// Directory-backed store, one `<key>.json` file per key
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    root: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> CommonResult<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(CommonError::Generic(format!("Invalid snapshot key: {key:?}")));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self, key: &str) -> CommonResult<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, key: &str, value: &str) -> CommonResult<()> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.root)?;

        // Readers never observe a partially written snapshot
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> CommonResult<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store for testing
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    entries: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `store`/`remove` fail (simulates a full quota)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_writable(&self) -> CommonResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(CommonError::Generic("Snapshot storage quota exceeded".to_string()))
        } else {
            Ok(())
        }
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self, key: &str) -> CommonResult<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> CommonResult<()> {
        self.check_writable()?;
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> CommonResult<()> {
        self.check_writable()?;
        self.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemorySnapshotStore::new();
        assert_eq!(store.load("a").unwrap(), None);

        store.store("a", "{}").unwrap();
        assert_eq!(store.load("a").unwrap().as_deref(), Some("{}"));

        store.remove("a").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_memory_store_failing_writes() {
        let store = MemorySnapshotStore::new();
        store.set_fail_writes(true);
        assert!(store.store("a", "{}").is_err());
        assert!(!store.contains("a"));
    }

    #[test]
    fn test_file_store_creates_directory_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("history"));

        assert_eq!(store.load("manual_editor_undo_1").unwrap(), None);
        store.store("manual_editor_undo_1", "{\"a\":1}").unwrap();
        assert_eq!(
            store.load("manual_editor_undo_1").unwrap().as_deref(),
            Some("{\"a\":1}")
        );

        store.remove("manual_editor_undo_1").unwrap();
        // Removing twice is fine
        store.remove("manual_editor_undo_1").unwrap();
        assert_eq!(store.load("manual_editor_undo_1").unwrap(), None);
    }

    #[test]
    fn test_file_store_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        assert!(store.store("../escape", "x").is_err());
        assert!(store.load("").is_err());
    }
}
