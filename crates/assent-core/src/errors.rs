//! Error types for consent storage and configuration.

use std::path::PathBuf;

/// Storage faults observed by a backend.
///
/// None of these ever reach callers of the consent components: reads degrade
/// to "absent" and writes degrade to no-ops. They exist so backends can tell
/// the diagnostic channel what went wrong.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Storage is disabled, blocked, or otherwise unreachable.
    #[error("storage unavailable: {message}")]
    Unavailable { message: String },

    /// The write would exceed the backend's quota.
    #[error("storage quota exceeded: {message}")]
    QuotaExceeded { message: String },

    /// A stored value could not be parsed.
    #[error("malformed stored value under '{key}': {message}")]
    Malformed { key: String, message: String },
}

impl StorageError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn quota(needed: usize, quota: usize) -> Self {
        Self::QuotaExceeded {
            message: format!("{needed} bytes needed, {quota} allowed"),
        }
    }

    pub fn malformed(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Stable short code for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => "storage_unavailable",
            Self::QuotaExceeded { .. } => "storage_quota_exceeded",
            Self::Malformed { .. } => "malformed_stored_value",
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::StorageFull => Self::QuotaExceeded {
                message: err.to_string(),
            },
            _ => Self::Unavailable {
                message: err.to_string(),
            },
        }
    }
}

/// Result type for storage backends.
pub type StorageResult<T> = Result<T, StorageError>;

/// Configuration errors. The only errors surfaced to callers.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid environment override {var}={value}: {message}")]
    Env {
        var: String,
        value: String,
        message: String,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}
