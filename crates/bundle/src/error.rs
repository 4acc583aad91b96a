use thiserror::Error;

/// Result type for bundle operations
pub type Result<T> = std::result::Result<T, BundleError>;

/// Errors that can occur while reading and ingesting a diagnostic bundle
#[derive(Error, Debug)]
pub enum BundleError {
    /// The byte stream is not a valid compressed archive. This is the only
    /// error that aborts an ingestion.
    #[error("Archive is not a valid ZIP container: {0}")]
    ArchiveCorrupt(String),

    /// A single archive entry could not be decompressed or decoded
    #[error("Failed to read archive entry {path}: {reason}")]
    EntryRead { path: String, reason: String },

    /// A single archive entry is larger than the configured limit
    #[error("Archive entry {path} is {size} bytes (limit {limit})")]
    EntryTooLarge { path: String, size: u64, limit: u64 },

    /// The best-effort store refused a write
    #[error("Storage quota exceeded for {key}: need {needed} bytes, quota {quota}")]
    QuotaExceeded {
        key: String,
        needed: usize,
        quota: usize,
    },

    /// Generic storage backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A demo fixture is missing or unreadable
    #[error("Demo data unavailable ({file}): {reason}")]
    DemoUnavailable { file: String, reason: String },

    /// IO error occurred
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BundleError {
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::ArchiveCorrupt(msg.into())
    }

    pub fn entry_read(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::EntryRead {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// True for the single error class that aborts ingestion
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ArchiveCorrupt(_))
    }
}
