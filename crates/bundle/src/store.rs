use crate::config::{IngestConfig, StoreBackend};
use crate::error::{BundleError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const INDEX_TEMPLATES_KEY: &str = "index_templates";
pub const ALIASES_KEY: &str = "aliases";

/// Quota-bounded key-value store for documents used by ad hoc lookups.
///
/// Values are stored serialized; the quota counts serialized bytes across
/// all keys.
pub trait KeyValueStore: Send + Sync {
    fn put(&self, key: &str, value: &Value) -> Result<usize>;
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn remove(&self, key: &str) -> Result<()>;
    fn used_bytes(&self) -> Result<usize>;
}

/// Outcome of a best-effort write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StoreOutcome {
    Stored { bytes: usize },
    Degraded { reason: String },
}

impl StoreOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored { .. })
    }
}

/// Write `value` under `key`, turning every failure into
/// [`StoreOutcome::Degraded`].
pub fn persist_best_effort(store: &dyn KeyValueStore, key: &str, value: &Value) -> StoreOutcome {
    match store.put(key, value) {
        Ok(bytes) => StoreOutcome::Stored { bytes },
        Err(err) => {
            log::warn!("Failed to store {key}: {err}");
            StoreOutcome::Degraded {
                reason: err.to_string(),
            }
        }
    }
}

/// Build the store selected by the configuration
pub fn open_store(config: &IngestConfig) -> Result<Arc<dyn KeyValueStore>> {
    config.validate()?;
    Ok(match config.store_backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new(config.store_quota_bytes)),
        StoreBackend::File => Arc::new(FileStore::new(&config.store_dir, config.store_quota_bytes)),
    })
}

fn check_quota(key: &str, others: usize, needed: usize, quota: usize) -> Result<()> {
    if others.saturating_add(needed) > quota {
        return Err(BundleError::QuotaExceeded {
            key: key.to_string(),
            needed,
            quota,
        });
    }
    Ok(())
}

/// In-process store. Contents vanish with the process.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    quota_bytes: usize,
}

impl MemoryStore {
    pub fn new(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota_bytes,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| BundleError::storage("memory store mutex poisoned"))
    }
}

impl KeyValueStore for MemoryStore {
    fn put(&self, key: &str, value: &Value) -> Result<usize> {
        let raw = serde_json::to_string(value)?;
        let mut entries = self.lock()?;
        let others: usize = entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(_, v)| v.len())
            .sum();
        check_quota(key, others, raw.len(), self.quota_bytes)?;
        let bytes = raw.len();
        entries.insert(key.to_string(), raw);
        Ok(bytes)
    }

    fn get(&self, key: &str) -> Result<Option<Value>> {
        let entries = self.lock()?;
        entries
            .get(key)
            .map(|raw| serde_json::from_str(raw).map_err(BundleError::from))
            .transpose()
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn used_bytes(&self) -> Result<usize> {
        Ok(self.lock()?.values().map(String::len).sum())
    }
}

/// Directory-backed store: one `<key>.json` file per key
pub struct FileStore {
    dir: PathBuf,
    quota_bytes: usize,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>, quota_bytes: usize) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            quota_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(BundleError::storage(format!("invalid store key '{key}'")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn sizes_except(&self, key: &str) -> Result<usize> {
        let read_dir = match std::fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };
        let skip = format!("{key}.json");
        let mut total = 0usize;
        for entry in read_dir {
            let entry = entry?;
            if entry.file_name().to_string_lossy() == skip {
                continue;
            }
            let meta = entry.metadata()?;
            if meta.is_file() {
                total = total.saturating_add(meta.len() as usize);
            }
        }
        Ok(total)
    }
}

impl KeyValueStore for FileStore {
    fn put(&self, key: &str, value: &Value) -> Result<usize> {
        let path = self.path_for(key)?;
        let raw = serde_json::to_vec(value)?;
        check_quota(key, self.sizes_except(key)?, raw.len(), self.quota_bytes)?;
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(&path, &raw)?;
        Ok(raw.len())
    }

    fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn used_bytes(&self) -> Result<usize> {
        self.sizes_except("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new(1024);
        let value = json!({"logs": {"aliases": {"logs-current": {}}}});
        let outcome = persist_best_effort(&store, ALIASES_KEY, &value);
        assert!(outcome.is_stored());
        assert_eq!(store.get(ALIASES_KEY).unwrap(), Some(value));
        assert_eq!(store.get(INDEX_TEMPLATES_KEY).unwrap(), None);
    }

    #[test]
    fn quota_failure_degrades() {
        let store = MemoryStore::new(8);
        let outcome = persist_best_effort(&store, ALIASES_KEY, &json!({"too": "large for quota"}));
        match outcome {
            StoreOutcome::Degraded { reason } => assert!(reason.contains("quota")),
            other => panic!("expected degraded, got {other:?}"),
        }
        assert_eq!(store.used_bytes().unwrap(), 0);
    }

    #[test]
    fn overwrite_does_not_double_count() {
        let store = MemoryStore::new(12);
        assert!(persist_best_effort(&store, "k", &json!("12345678")).is_stored());
        assert!(persist_best_effort(&store, "k", &json!("87654321")).is_stored());
        assert_eq!(store.used_bytes().unwrap(), 10);
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("store"), 4096);
        let value = json!({"index_templates": [{"name": "logs"}]});
        assert!(persist_best_effort(&store, INDEX_TEMPLATES_KEY, &value).is_stored());
        assert!(dir.path().join("store/index_templates.json").exists());
        assert_eq!(store.get(INDEX_TEMPLATES_KEY).unwrap(), Some(value));

        store.remove(INDEX_TEMPLATES_KEY).unwrap();
        assert_eq!(store.get(INDEX_TEMPLATES_KEY).unwrap(), None);
        assert_eq!(store.used_bytes().unwrap(), 0);
    }

    #[test]
    fn file_store_counts_other_keys_against_quota() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path(), 20);
        assert!(persist_best_effort(&store, ALIASES_KEY, &json!("0123456789")).is_stored());
        let outcome = persist_best_effort(&store, INDEX_TEMPLATES_KEY, &json!("0123456789"));
        assert!(!outcome.is_stored());
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path(), 1024);
        assert!(store.put("../escape", &json!(1)).is_err());
    }

    #[test]
    fn open_store_validates_config() {
        let mut config = IngestConfig::in_memory();
        config.store_quota_bytes = 0;
        assert!(open_store(&config).is_err());
    }
}
