#![forbid(unsafe_code)]

//! Key-value storage for layout and preference persistence.
//!
//! The layout restorer persists string blobs (the deflated layout, the
//! disabled flag, preference values) under string keys. [`StorageBackend`]
//! abstracts where those live: [`MemoryStorage`] for tests and ephemeral
//! sessions, [`FileStorage`] for a JSON file on disk.
//!
//! # Design Invariants
//!
//! 1. **Graceful degradation**: storage failures never panic; operations
//!    return `Result`.
//! 2. **Atomic writes**: file storage uses the write-rename pattern.
//! 3. **Version gate**: a file with an unknown format version is ignored
//!    wholesale (treated as empty), never partially merged.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `StorageError::Io` | File I/O failure | Returns error, nothing written |
//! | `StorageError::Serialization` | JSON encode/decode | Returns error |
//! | `StorageError::Corruption` | Poisoned lock, bad file | Returns error |
//! | Format version mismatch | Older/newer writer | Load sees empty store |

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error during file operations.
    Io(std::io::Error),
    /// Serialization or deserialization error.
    Serialization(String),
    /// Storage state is corrupted (bad file, poisoned lock).
    Corruption(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            StorageError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            StorageError::Corruption(msg) => write!(f, "storage corruption: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            StorageError::Serialization(_) | StorageError::Corruption(_) => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// ─────────────────────────────────────────────────────────────────────────────
// Storage Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Pluggable string key-value persistence.
///
/// Implementations must be thread-safe (`Send + Sync`); the restorer may be
/// driven from async tasks.
pub trait StorageBackend: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Read one value, `None` if the key was never written.
    fn load(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write one value, replacing any previous one.
    fn save(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove one key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Remove everything.
    fn clear(&self) -> StorageResult<()>;

    /// Check if the backend is available and functional.
    fn is_available(&self) -> bool {
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory Storage (always available)
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory storage backend for testing and ephemeral sessions.
///
/// State is lost when the process exits.
#[derive(Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create memory storage pre-populated with entries.
    #[must_use]
    pub fn with_entries(entries: HashMap<String, String>) -> Self {
        Self {
            data: RwLock::new(entries),
        }
    }
}

impl StorageBackend for MemoryStorage {
    fn name(&self) -> &str {
        "MemoryStorage"
    }

    fn load(&self, key: &str) -> StorageResult<Option<String>> {
        let guard = self
            .data
            .read()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        Ok(guard.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        guard.remove(key);
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        guard.clear();
        Ok(())
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.data.read().map(|g| g.len()).unwrap_or(0);
        f.debug_struct("MemoryStorage")
            .field("entries", &count)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Storage
// ─────────────────────────────────────────────────────────────────────────────

/// File format for the stored key-value map (JSON).
#[derive(Serialize, Deserialize)]
struct StoreFile {
    /// Format version for future migrations.
    format_version: u32,
    /// Map of key -> raw string value.
    entries: HashMap<String, String>,
}

impl StoreFile {
    const FORMAT_VERSION: u32 = 1;

    fn new() -> Self {
        Self {
            format_version: Self::FORMAT_VERSION,
            entries: HashMap::new(),
        }
    }
}

/// File-based storage backend using one JSON file.
///
/// Every mutation rewrites the file through a temporary path plus rename so
/// a crash mid-write leaves the previous contents intact.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Create a file storage at the given path.
    ///
    /// The file does not need to exist; it is created on first save.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone();
        tmp.set_extension("json.tmp");
        tmp
    }

    fn read_file(&self) -> StorageResult<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let store: StoreFile = serde_json::from_reader(reader)
            .map_err(|e| StorageError::Serialization(format!("failed to parse store file: {e}")))?;

        if store.format_version != StoreFile::FORMAT_VERSION {
            tracing::warn!(
                stored = store.format_version,
                expected = StoreFile::FORMAT_VERSION,
                "store file format version mismatch, ignoring stored state"
            );
            return Ok(HashMap::new());
        }
        Ok(store.entries)
    }

    fn write_file(&self, entries: HashMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let store = StoreFile {
            format_version: StoreFile::FORMAT_VERSION,
            entries,
        };

        let tmp = self.temp_path();
        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, &store)
                .map_err(|e| StorageError::Serialization(format!("failed to encode store: {e}")))?;
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StorageBackend for FileStorage {
    fn name(&self) -> &str {
        "FileStorage"
    }

    fn load(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.read_file()?.remove(key))
    }

    fn save(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut entries = self.read_file()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_file(entries)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut entries = self.read_file()?;
        if entries.remove(key).is_some() {
            self.write_file(entries)?;
        }
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                parent.exists() || fs::create_dir_all(parent).is_ok()
            }
            _ => true,
        }
    }
}

impl fmt::Debug for FileStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStorage")
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryStorage, StorageBackend};
    use std::collections::HashMap;

    #[test]
    fn memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.load("layout").unwrap(), None);

        storage.save("layout", "{\"version\":0.2}").unwrap();
        assert_eq!(
            storage.load("layout").unwrap().as_deref(),
            Some("{\"version\":0.2}")
        );

        storage.remove("layout").unwrap();
        assert_eq!(storage.load("layout").unwrap(), None);
    }

    #[test]
    fn memory_storage_overwrites() {
        let storage = MemoryStorage::new();
        storage.save("k", "a").unwrap();
        storage.save("k", "b").unwrap();
        assert_eq!(storage.load("k").unwrap().as_deref(), Some("b"));
    }

    #[test]
    fn memory_storage_clear_removes_everything() {
        let mut seed = HashMap::new();
        seed.insert("a".to_string(), "1".to_string());
        seed.insert("b".to_string(), "2".to_string());
        let storage = MemoryStorage::with_entries(seed);

        storage.clear().unwrap();
        assert_eq!(storage.load("a").unwrap(), None);
        assert_eq!(storage.load("b").unwrap(), None);
    }

    #[test]
    fn remove_absent_key_is_ok() {
        let storage = MemoryStorage::new();
        assert!(storage.remove("never-written").is_ok());
    }
}
