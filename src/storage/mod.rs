//! Typed, validated persistence over a key-value storage backend.
//!
//! Every value is written inside a versioned envelope:
//!
//! ```text
//! readshelf_readingLists = {"data": {...}, "timestamp": 1718000000000, "version": 1}
//! ```
//!
//! Keys are namespaced under a fixed prefix so bulk operations never touch
//! data that belongs to someone else.

pub mod backend;
pub mod merge;
pub mod schema;
pub mod service;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use backend::{BackendError, FileBackend, MemoryBackend, StorageBackend};
pub use schema::{Property, Schema, SchemaRegistry, SchemaViolation, TypedCheck, ValueType};
pub use service::{
    ImportOptions, ImportReport, Loaded, PersistenceService, SaveOptions, StorageStats,
};

/// Current envelope format version
pub const FORMAT_VERSION: u32 = 1;

/// Application name written into backups
pub const APP_NAME: &str = "readshelf";

/// Default key namespace
pub const DEFAULT_PREFIX: &str = "readshelf_";

/// Assumed substrate capacity (5 MiB)
pub const DEFAULT_CAPACITY_BYTES: usize = 5 * 1024 * 1024;

/// Longest search history kept under [`keys::SEARCH_HISTORY`]
pub const MAX_SEARCH_HISTORY: usize = 50;

/// Well-known storage keys
pub mod keys {
    pub const READING_LISTS: &str = "readingLists";
    pub const PREFERENCES: &str = "preferences";
    pub const SEARCH_HISTORY: &str = "searchHistory";
}

/// The on-disk envelope around every persisted value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord<T> {
    pub data: T,

    /// Write time, milliseconds since the Unix epoch
    pub timestamp: i64,

    pub version: u32,
}

impl<T> StoredRecord<T> {
    /// Wrap data with the current time and format version
    pub fn new(data: T) -> Self {
        Self {
            data,
            timestamp: chrono::Utc::now().timestamp_millis(),
            version: FORMAT_VERSION,
        }
    }
}

/// Errors surfaced by the persistence service
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage is not available")]
    Unavailable,

    #[error("Storage quota exceeded while writing '{key}'")]
    QuotaExceeded { key: String },

    #[error("Validation failed for '{key}': {violation}")]
    ValidationFailed {
        key: String,
        violation: SchemaViolation,
    },

    #[error("Import rejected, no key passed validation: {}", .warnings.join("; "))]
    ImportRejected { warnings: Vec<String> },

    #[error("Failed to parse stored data: {0}")]
    Parse(String),

    #[error("Storage error: {0}")]
    Unknown(String),
}

impl StorageError {
    /// Stable error code for display and logs
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable => "STORAGE_UNAVAILABLE",
            Self::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            Self::ValidationFailed { .. } | Self::ImportRejected { .. } => "VALIDATION_FAILED",
            Self::Parse(_) => "PARSE_ERROR",
            Self::Unknown(_) => "UNKNOWN",
        }
    }

    /// Wrap a backend failure that happened while touching `key`
    pub(crate) fn from_backend(key: &str, err: BackendError) -> Self {
        match err {
            BackendError::QuotaExceeded => Self::QuotaExceeded {
                key: key.to_string(),
            },
            BackendError::Unavailable => Self::Unavailable,
            other => Self::Unknown(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(StorageError::Unavailable.code(), "STORAGE_UNAVAILABLE");
        assert_eq!(
            StorageError::QuotaExceeded { key: "k".into() }.code(),
            "QUOTA_EXCEEDED"
        );
        assert_eq!(
            StorageError::ImportRejected { warnings: vec![] }.code(),
            "VALIDATION_FAILED"
        );
        assert_eq!(StorageError::Parse("bad".into()).code(), "PARSE_ERROR");
    }

    #[test]
    fn test_backend_error_mapping() {
        let err = StorageError::from_backend("prefs", BackendError::QuotaExceeded);
        assert!(matches!(err, StorageError::QuotaExceeded { ref key } if key == "prefs"));

        let err = StorageError::from_backend("prefs", BackendError::Unavailable);
        assert!(matches!(err, StorageError::Unavailable));
    }

    #[test]
    fn test_record_envelope_shape() {
        let record = StoredRecord::new(serde_json::json!({"a": 1}));
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["version"], 1);
        assert_eq!(json["data"]["a"], 1);
        assert!(json["timestamp"].as_i64().unwrap() > 0);
    }
}
