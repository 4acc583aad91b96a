use crate::error::{BundleError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_STORE_BACKEND: &str = "ESDIAG_STORE_BACKEND";
pub const ENV_STORE_DIR: &str = "ESDIAG_STORE_DIR";
pub const ENV_STORE_QUOTA_BYTES: &str = "ESDIAG_STORE_QUOTA_BYTES";
pub const ENV_MAX_ENTRY_BYTES: &str = "ESDIAG_MAX_ENTRY_BYTES";

/// Configuration for bundle ingestion and best-effort persistence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Where secondary documents are persisted
    pub store_backend: StoreBackend,

    /// Directory used by the file backend
    pub store_dir: PathBuf,

    /// Total bytes the store may hold across all keys
    pub store_quota_bytes: usize,

    /// Entries larger than this (uncompressed) are recorded as failures
    pub max_entry_bytes: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::File,
            store_dir: PathBuf::from(".esdiag/store"),
            store_quota_bytes: 5 * 1024 * 1024,
            max_entry_bytes: 256 * 1024 * 1024,
        }
    }
}

/// Backend for the best-effort key-value store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    File,
    Memory,
}

impl StoreBackend {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(BundleError::invalid_config(format!(
                "unknown store backend '{other}' (expected file|memory)"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Memory => "memory",
        }
    }
}

impl IngestConfig {
    /// Ephemeral configuration: memory store, default limits
    pub fn in_memory() -> Self {
        Self {
            store_backend: StoreBackend::Memory,
            ..Default::default()
        }
    }

    /// Load configuration from a TOML file. Missing keys keep their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|err| {
            BundleError::invalid_config(format!("config is not valid TOML: {err}"))
        })
    }

    /// Apply `ESDIAG_*` environment overrides on top of `self`
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Same as [`with_env_overrides`](Self::with_env_overrides) with an injectable lookup
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(raw) = lookup(ENV_STORE_BACKEND) {
            self.store_backend = StoreBackend::parse(&raw)?;
        }
        if let Some(raw) = lookup(ENV_STORE_DIR) {
            if !raw.trim().is_empty() {
                self.store_dir = PathBuf::from(raw);
            }
        }
        if let Some(raw) = lookup(ENV_STORE_QUOTA_BYTES) {
            self.store_quota_bytes = raw.trim().parse().map_err(|_| {
                BundleError::invalid_config(format!(
                    "{ENV_STORE_QUOTA_BYTES} must be an integer, got '{raw}'"
                ))
            })?;
        }
        if let Some(raw) = lookup(ENV_MAX_ENTRY_BYTES) {
            self.max_entry_bytes = raw.trim().parse().map_err(|_| {
                BundleError::invalid_config(format!(
                    "{ENV_MAX_ENTRY_BYTES} must be an integer, got '{raw}'"
                ))
            })?;
        }
        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.store_quota_bytes == 0 {
            return Err(BundleError::invalid_config("store_quota_bytes must be > 0"));
        }
        if self.max_entry_bytes == 0 {
            return Err(BundleError::invalid_config("max_entry_bytes must be > 0"));
        }
        if self.store_backend == StoreBackend::File && self.store_dir.as_os_str().is_empty() {
            return Err(BundleError::invalid_config(
                "store_dir must be set for the file backend",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_valid() {
        assert!(IngestConfig::default().validate().is_ok());
        assert!(IngestConfig::in_memory().validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = IngestConfig::default();

        config.store_quota_bytes = 0;
        assert!(config.validate().is_err());

        config.store_quota_bytes = 1024;
        config.max_entry_bytes = 0;
        assert!(config.validate().is_err());

        config.max_entry_bytes = 1024;
        config.store_dir = PathBuf::new();
        assert!(config.validate().is_err());

        config.store_backend = StoreBackend::Memory;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = IngestConfig::from_toml_str("store_backend = \"memory\"\n").unwrap();
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.store_quota_bytes, IngestConfig::default().store_quota_bytes);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = IngestConfig::from_toml_str("store_backend = [").unwrap_err();
        assert!(matches!(err, BundleError::InvalidConfig(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_STORE_BACKEND, "memory"),
            (ENV_STORE_QUOTA_BYTES, "2048"),
            (ENV_STORE_DIR, "/tmp/esdiag"),
        ]);
        let config = IngestConfig::default()
            .with_overrides_from(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.store_quota_bytes, 2048);
        assert_eq!(config.store_dir, PathBuf::from("/tmp/esdiag"));
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let result = IngestConfig::default().with_overrides_from(|key| {
            (key == ENV_STORE_QUOTA_BYTES).then(|| "lots".to_string())
        });
        assert!(result.is_err());

        let result = IngestConfig::default()
            .with_overrides_from(|key| (key == ENV_STORE_BACKEND).then(|| "redis".to_string()));
        assert!(result.is_err());
    }
}
