//! Persistence service: validated save/load, backup export/import and
//! usage statistics over a [`StorageBackend`].

use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::backend::StorageBackend;
use super::merge::merge_values;
use super::schema::{Schema, SchemaRegistry};
use super::{StorageError, StoredRecord, APP_NAME, DEFAULT_CAPACITY_BYTES, DEFAULT_PREFIX, FORMAT_VERSION};

/// Key written and removed to probe backend availability
const PROBE_KEY: &str = "__storage_test__";

/// Top-level backup fields that are never treated as data keys
const BACKUP_METADATA_KEYS: [&str; 3] = ["version", "exportedAt", "app"];

/// Options for [`PersistenceService::save`]
#[derive(Debug, Clone, Copy)]
pub struct SaveOptions {
    pub validate: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self { validate: true }
    }
}

/// Options for [`PersistenceService::import_all`]
#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    /// Merge with existing values instead of overwriting
    pub merge: bool,
    pub validate: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            merge: false,
            validate: true,
        }
    }
}

/// A loaded value and, when it was stored in an envelope, its write time
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub data: T,
    pub timestamp: Option<i64>,
}

/// Outcome of an import
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    /// Keys that were written
    pub imported: Vec<String>,

    /// Per-key problems that caused a key to be skipped
    pub warnings: Vec<String>,
}

/// Storage usage, for display only
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StorageStats {
    /// Bytes used by namespaced keys and values
    pub used: usize,

    /// Assumed capacity in bytes
    pub total: usize,

    /// `used / total` in percent, two decimals
    pub percentage: f64,

    /// Number of namespaced keys
    pub items: usize,
}

/// Backup document produced by [`PersistenceService::export_all`]
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Backup {
    version: u32,
    exported_at: String,
    app: String,
    data: Map<String, Value>,
}

/// Typed, validated access to namespaced keys of a storage backend
pub struct PersistenceService<B> {
    backend: B,
    prefix: String,
    capacity: usize,
    schemas: SchemaRegistry,
}

impl<B: StorageBackend> PersistenceService<B> {
    /// Service with the default prefix, capacity and schemas
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            prefix: DEFAULT_PREFIX.to_string(),
            capacity: DEFAULT_CAPACITY_BYTES,
            schemas: SchemaRegistry::with_defaults(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Capacity reported by [`stats`](Self::stats)
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_schemas(mut self, schemas: SchemaRegistry) -> Self {
        self.schemas = schemas;
        self
    }

    pub fn register_schema(&mut self, key: impl Into<String>, schema: Schema) {
        self.schemas.register(key, schema);
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Probe the backend with a throwaway write and remove
    pub fn is_available(&self) -> bool {
        let probe = self.namespaced(PROBE_KEY);
        self.backend.set(&probe, "1").is_ok() && self.backend.remove(&probe).is_ok()
    }

    fn ensure_available(&self) -> Result<(), StorageError> {
        if self.is_available() {
            Ok(())
        } else {
            warn!("Storage backend is unavailable");
            Err(StorageError::Unavailable)
        }
    }

    /// Save `data` under `key`, validating against its schema first
    pub fn save<T: Serialize + ?Sized>(
        &self,
        key: &str,
        data: &T,
        options: SaveOptions,
    ) -> Result<(), StorageError> {
        let value = serde_json::to_value(data)
            .map_err(|e| StorageError::Unknown(format!("Failed to serialize '{}': {}", key, e)))?;
        self.save_value(key, value, options)
    }

    /// Save an already-built JSON value under `key`
    pub fn save_value(&self, key: &str, value: Value, options: SaveOptions) -> Result<(), StorageError> {
        self.ensure_available()?;

        if options.validate {
            if let Err(violation) = self.schemas.validate(key, &value) {
                warn!(key, %violation, "Rejected write that fails schema validation");
                return Err(StorageError::ValidationFailed {
                    key: key.to_string(),
                    violation,
                });
            }
        }

        self.write_record(key, value)
    }

    fn write_record(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let record = StoredRecord::new(value);
        let serialized = serde_json::to_string(&record)
            .map_err(|e| StorageError::Unknown(format!("Failed to serialize '{}': {}", key, e)))?;

        self.backend
            .set(&self.namespaced(key), &serialized)
            .map_err(|e| {
                let err = StorageError::from_backend(key, e);
                warn!(key, code = err.code(), "Storage write failed");
                err
            })?;

        debug!(key, bytes = serialized.len(), "Saved key");
        Ok(())
    }

    /// Load `key`, returning `default` when it has never been written
    pub fn load<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<Loaded<T>, StorageError> {
        let Some(loaded) = self.load_value(key)? else {
            return Ok(Loaded {
                data: default,
                timestamp: None,
            });
        };

        let data = serde_json::from_value(loaded.data)
            .map_err(|e| StorageError::Parse(format!("Unexpected shape for '{}': {}", key, e)))?;

        Ok(Loaded {
            data,
            timestamp: loaded.timestamp,
        })
    }

    /// Load the raw JSON payload of `key`, unwrapping the envelope if present
    pub fn load_value(&self, key: &str) -> Result<Option<Loaded<Value>>, StorageError> {
        let raw = self
            .backend
            .get(&self.namespaced(key))
            .map_err(|e| StorageError::from_backend(key, e))?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        let parsed: Value = serde_json::from_str(&raw)
            .map_err(|e| StorageError::Parse(format!("Malformed JSON under '{}': {}", key, e)))?;

        Ok(Some(unwrap_envelope(parsed)))
    }

    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.ensure_available()?;
        self.backend
            .remove(&self.namespaced(key))
            .map_err(|e| StorageError::from_backend(key, e))
    }

    /// Bare names of every key under this service's prefix
    pub fn keys(&self) -> Result<Vec<String>, StorageError> {
        let all = self
            .backend
            .keys()
            .map_err(|e| StorageError::from_backend("*", e))?;

        Ok(all
            .into_iter()
            .filter_map(|k| k.strip_prefix(&self.prefix).map(str::to_string))
            .filter(|k| k != PROBE_KEY)
            .collect())
    }

    /// Remove every namespaced key, leaving foreign keys untouched
    pub fn clear_all(&self) -> Result<(), StorageError> {
        self.ensure_available()?;

        let keys = self.keys()?;
        for key in &keys {
            self.backend
                .remove(&self.namespaced(key))
                .map_err(|e| StorageError::from_backend(key, e))?;
        }

        info!(count = keys.len(), "Cleared stored data");
        Ok(())
    }

    /// Serialize every namespaced key into a backup document
    pub fn export_all(&self) -> Result<String, StorageError> {
        let mut data = Map::new();

        for key in self.keys()? {
            let raw = self
                .backend
                .get(&self.namespaced(&key))
                .map_err(|e| StorageError::from_backend(&key, e))?;
            if let Some(raw) = raw {
                let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
                data.insert(key, value);
            }
        }

        let backup = Backup {
            version: FORMAT_VERSION,
            exported_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            app: APP_NAME.to_string(),
            data,
        };

        info!(keys = backup.data.len(), "Exported stored data");
        serde_json::to_string_pretty(&backup)
            .map_err(|e| StorageError::Unknown(format!("Failed to serialize backup: {}", e)))
    }

    /// Import a backup document or a flat `{key: value}` map
    pub fn import_all(&self, json: &str, options: ImportOptions) -> Result<ImportReport, StorageError> {
        let parsed: Value = serde_json::from_str(json)
            .map_err(|e| StorageError::Parse(format!("Invalid import JSON: {}", e)))?;

        let Value::Object(root) = parsed else {
            return Err(StorageError::Parse("Import must be a JSON object".to_string()));
        };

        self.ensure_available()?;

        let entries = backup_entries(root);
        let candidates = entries.len();
        let mut report = ImportReport::default();

        for (key, value) in entries {
            let incoming = unwrap_envelope(value).data;

            if options.validate {
                if let Err(violation) = self.schemas.validate(&key, &incoming) {
                    warn!(key = %key, %violation, "Skipping key that fails validation");
                    report.warnings.push(format!("{}: {}", key, violation));
                    continue;
                }
            }

            let value = if options.merge {
                let existing = match self.load_value(&key) {
                    Ok(existing) => existing.map(|l| l.data),
                    Err(e) => {
                        warn!(key = %key, error = %e, "Existing value unreadable, overwriting");
                        None
                    }
                };
                let merged = merge_values(existing, incoming);

                // Limits such as maxItems apply to the union, not each half
                if options.validate {
                    if let Err(violation) = self.schemas.validate(&key, &merged) {
                        warn!(key = %key, %violation, "Skipping key whose merged value fails validation");
                        report.warnings.push(format!("{}: merged value {}", key, violation));
                        continue;
                    }
                }
                merged
            } else {
                incoming
            };

            self.write_record(&key, value)?;
            report.imported.push(key);
        }

        if candidates > 0 && report.imported.is_empty() {
            return Err(StorageError::ImportRejected {
                warnings: report.warnings,
            });
        }

        info!(
            imported = report.imported.len(),
            warnings = report.warnings.len(),
            merge = options.merge,
            "Imported stored data"
        );
        Ok(report)
    }

    /// Bytes used by namespaced entries against the assumed capacity
    pub fn stats(&self) -> Result<StorageStats, StorageError> {
        let mut used = 0;
        let mut items = 0;

        for key in self.keys()? {
            let full = self.namespaced(&key);
            let value = self
                .backend
                .get(&full)
                .map_err(|e| StorageError::from_backend(&key, e))?
                .unwrap_or_default();
            used += full.len() + value.len();
            items += 1;
        }

        let percentage = if self.capacity == 0 {
            0.0
        } else {
            (used as f64 / self.capacity as f64 * 10_000.0).round() / 100.0
        };

        Ok(StorageStats {
            used,
            total: self.capacity,
            percentage,
            items,
        })
    }
}

/// Unwrap a `{data, timestamp, version}` envelope; legacy raw values pass through
fn unwrap_envelope(value: Value) -> Loaded<Value> {
    match value {
        Value::Object(mut map) if map.contains_key("data") => {
            let timestamp = map.get("timestamp").and_then(Value::as_i64);
            let data = map.remove("data").unwrap_or(Value::Null);
            Loaded { data, timestamp }
        }
        other => Loaded {
            data: other,
            timestamp: None,
        },
    }
}

/// Data entries of an import document, in either accepted shape
fn backup_entries(mut root: Map<String, Value>) -> Vec<(String, Value)> {
    let is_backup = root.contains_key("exportedAt") || root.contains_key("app");
    if is_backup {
        if let Some(Value::Object(data)) = root.remove("data") {
            return data.into_iter().collect();
        }
    }

    root.into_iter()
        .filter(|(k, _)| !BACKUP_METADATA_KEYS.contains(&k.as_str()))
        .collect()
}
