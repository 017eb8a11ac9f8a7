//! Persisted highlight state for remount recovery.
//!
//! When a compare-with-previous rule finds changed cells, the coordinates are
//! written under the view's [`RecoveryKey`]. If the view is torn down and
//! mounted again before the highlight expires, the new instance reads the
//! entry back and resumes the highlight.
//!
//! Storage is best effort. A failed write means a remount loses its pending
//! highlights; it never surfaces as an error.

use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use cellblink_config::{BlinkSettings, RecoveryBackend};
use cellblink_core::{CellCoord, RecoveryKey};
use serde::{Deserialize, Serialize};

/// Text-level key/value storage scoped by [`RecoveryKey`].
///
/// Implementors provide `read`/`write`/`delete`; the typed `get`/`put`/`remove`
/// layer handles the `[[row, col], ...]` payload format.
pub trait RecoveryStore {
    fn read(&self, key: &RecoveryKey) -> Option<String>;

    fn write(&self, key: &RecoveryKey, payload: &str);

    fn delete(&self, key: &RecoveryKey);

    /// Stored coordinates, or `None` when absent or unreadable.
    fn get(&self, key: &RecoveryKey) -> Option<Vec<CellCoord>> {
        let payload = self.read(key)?;
        match serde_json::from_str::<Vec<CellCoord>>(&payload) {
            Ok(coords) => Some(coords),
            Err(e) => {
                log::debug!("ignoring unreadable recovery entry {}: {}", key, e);
                None
            }
        }
    }

    /// Overwrite the entry for `key`.
    fn put(&self, key: &RecoveryKey, coords: &[CellCoord]) {
        match serde_json::to_string(coords) {
            Ok(payload) => self.write(key, &payload),
            Err(e) => log::warn!("cannot encode recovery entry {}: {}", key, e),
        }
    }

    fn remove(&self, key: &RecoveryKey) {
        self.delete(key);
    }
}

/// Pick the store configured in settings.
///
/// The memory backend returns the process-wide store so that every mount in
/// this thread sees the same entries.
pub fn open_recovery_store(settings: &BlinkSettings) -> Rc<dyn RecoveryStore> {
    match settings.recovery.backend {
        RecoveryBackend::Memory => Rc::new(MemoryRecoveryStore::process()),
        RecoveryBackend::File => Rc::new(FileRecoveryStore::new(settings.recovery.effective_dir())),
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// In-process store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecoveryStore {
    entries: Rc<RefCell<HashMap<RecoveryKey, String>>>,
}

thread_local! {
    static PROCESS_STORE: MemoryRecoveryStore = MemoryRecoveryStore::default();
}

impl MemoryRecoveryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the store shared by everything on this thread.
    pub fn process() -> Self {
        PROCESS_STORE.with(|store| store.clone())
    }

    pub fn contains(&self, key: &RecoveryKey) -> bool {
        self.entries.borrow().contains_key(key)
    }
}

impl RecoveryStore for MemoryRecoveryStore {
    fn read(&self, key: &RecoveryKey) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn write(&self, key: &RecoveryKey, payload: &str) {
        self.entries.borrow_mut().insert(key.clone(), payload.to_string());
    }

    fn delete(&self, key: &RecoveryKey) {
        self.entries.borrow_mut().remove(key);
    }
}

// ---------------------------------------------------------------------------
// File
// ---------------------------------------------------------------------------

/// On-disk envelope. The key is stored alongside the payload so a hash
/// collision between two keys reads as absent instead of as the wrong entry.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: RecoveryKey,
    payload: String,
}

/// One JSON file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileRecoveryStore {
    dir: PathBuf,
}

impl FileRecoveryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Hash the key text to create a unique filename
    fn entry_path(&self, key: &RecoveryKey) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        key.to_string().hash(&mut hasher);
        self.dir.join(format!("{:016x}.json", hasher.finish()))
    }

    fn try_write(&self, key: &RecoveryKey, payload: &str) -> Result<(), String> {
        fs::create_dir_all(&self.dir).map_err(|e| e.to_string())?;
        let entry = StoredEntry { key: key.clone(), payload: payload.to_string() };
        let json = serde_json::to_string(&entry).map_err(|e| e.to_string())?;
        fs::write(self.entry_path(key), json).map_err(|e| e.to_string())
    }
}

impl RecoveryStore for FileRecoveryStore {
    fn read(&self, key: &RecoveryKey) -> Option<String> {
        let path = self.entry_path(key);
        let contents = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<StoredEntry>(&contents) {
            Ok(entry) if entry.key == *key => Some(entry.payload),
            Ok(_) => None,
            Err(e) => {
                log::debug!("ignoring corrupt recovery file {}: {}", path.display(), e);
                None
            }
        }
    }

    fn write(&self, key: &RecoveryKey, payload: &str) {
        if let Err(e) = self.try_write(key, payload) {
            log::warn!("cannot persist recovery entry {}: {}", key, e);
        }
    }

    fn delete(&self, key: &RecoveryKey) {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("cannot remove recovery entry {}: {}", key, e),
        }
    }
}
