//! Key-value storage backends.
//!
//! A backend stores string values under string keys and enforces a byte
//! capacity. Exceeding the capacity is reported as
//! [`BackendError::QuotaExceeded`] so callers can tell it apart from I/O
//! failures.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use fs2::FileExt;
use thiserror::Error;

use super::DEFAULT_CAPACITY_BYTES;

/// Failures raised by a storage backend
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Storage quota exceeded")]
    QuotaExceeded,

    #[error("Storage backend unavailable")]
    Unavailable,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt storage file: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Raw key-value substrate
pub trait StorageBackend: Send + Sync {
    /// Read a value; `Ok(None)` when the key is absent
    fn get(&self, key: &str) -> Result<Option<String>, BackendError>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> Result<(), BackendError>;

    /// Delete a key (absent keys are not an error)
    fn remove(&self, key: &str) -> Result<(), BackendError>;

    /// Enumerate every stored key
    fn keys(&self) -> Result<Vec<String>, BackendError>;
}

/// Bytes a map would occupy, counting keys and values
fn used_bytes(entries: &BTreeMap<String, String>) -> usize {
    entries.iter().map(|(k, v)| k.len() + v.len()).sum()
}

/// Insert `key` unless doing so would exceed `capacity`
fn insert_within(
    entries: &mut BTreeMap<String, String>,
    capacity: usize,
    key: &str,
    value: &str,
) -> Result<(), BackendError> {
    let replaced = entries.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
    let projected = used_bytes(entries) - replaced + key.len() + value.len();
    if projected > capacity {
        return Err(BackendError::QuotaExceeded);
    }
    entries.insert(key.to_string(), value.to_string());
    Ok(())
}

// ============================================================================
// In-memory backend
// ============================================================================

/// In-process backend with a byte capacity
pub struct MemoryBackend {
    entries: Mutex<BTreeMap<String, String>>,
    capacity: usize,
    disabled: AtomicBool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY_BYTES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            capacity,
            disabled: AtomicBool::new(false),
        }
    }

    /// Simulate storage being switched off (every operation fails)
    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::SeqCst);
    }

    fn check_enabled(&self) -> Result<(), BackendError> {
        if self.disabled.load(Ordering::SeqCst) {
            Err(BackendError::Unavailable)
        } else {
            Ok(())
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        self.check_enabled()?;
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        self.check_enabled()?;
        insert_within(&mut self.entries(), self.capacity, key, value)
    }

    fn remove(&self, key: &str) -> Result<(), BackendError> {
        self.check_enabled()?;
        self.entries().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, BackendError> {
        self.check_enabled()?;
        Ok(self.entries().keys().cloned().collect())
    }
}

// ============================================================================
// File backend
// ============================================================================

/// Backend that keeps the whole store in one JSON object file.
///
/// Every operation takes an advisory lock on the file (shared for reads,
/// exclusive for writes) so two processes never interleave a
/// read-modify-write.
pub struct FileBackend {
    path: PathBuf,
    capacity: usize,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_capacity(path, DEFAULT_CAPACITY_BYTES)
    }

    pub fn with_capacity(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(file: &mut File) -> Result<BTreeMap<String, String>, BackendError> {
        let mut content = String::new();
        file.read_to_string(&mut content)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_map(file: &mut File, entries: &BTreeMap<String, String>) -> Result<(), BackendError> {
        let content = serde_json::to_string_pretty(entries)?;
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Read the current entries under a shared lock
    fn snapshot(&self) -> Result<BTreeMap<String, String>, BackendError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let mut file = File::open(&self.path)?;
        FileExt::lock_shared(&file)?;
        let result = Self::read_map(&mut file);
        FileExt::unlock(&file)?;
        result
    }

    /// Read-modify-write the entries under an exclusive lock
    fn update<R>(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, String>) -> Result<R, BackendError>,
    ) -> Result<R, BackendError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        FileExt::lock_exclusive(&file)?;

        let result = Self::read_map(&mut file).and_then(|mut entries| {
            let out = apply(&mut entries)?;
            Self::write_map(&mut file, &entries)?;
            Ok(out)
        });

        FileExt::unlock(&file)?;
        result
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self.snapshot()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        let capacity = self.capacity;
        self.update(|entries| insert_within(entries, capacity, key, value))
    }

    fn remove(&self, key: &str) -> Result<(), BackendError> {
        self.update(|entries| {
            entries.remove(key);
            Ok(())
        })
    }

    fn keys(&self) -> Result<Vec<String>, BackendError> {
        Ok(self.snapshot()?.into_keys().collect())
    }
}
