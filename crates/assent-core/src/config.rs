//! Consent configuration.
//!
//! Loaded from YAML with environment overrides:
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `ASSENT_POLICY_VERSION` | Current policy version (default: `1.0`) |
//! | `ASSENT_FLAG_TTL_DAYS` | Authoritative flag lifetime in days (default: 183) |
//! | `ASSENT_RETENTION_MONTHS` | Visit ledger retention window (default: 18) |

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

pub const DEFAULT_POLICY_VERSION: &str = "1.0";
pub const DEFAULT_FLAG_TTL_DAYS: u32 = 183;
pub const DEFAULT_RETENTION_MONTHS: u32 = 18;
pub const DEFAULT_FREQUENT_VISITS_PER_MONTH: f64 = 1.0;
/// Upper bound for `flag_ttl_days` (100 years). Keeps flag expiry dates
/// representable.
pub const MAX_FLAG_TTL_DAYS: u32 = 36_500;

pub const ENV_POLICY_VERSION: &str = "ASSENT_POLICY_VERSION";
pub const ENV_FLAG_TTL_DAYS: &str = "ASSENT_FLAG_TTL_DAYS";
pub const ENV_RETENTION_MONTHS: &str = "ASSENT_RETENTION_MONTHS";

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ConsentConfig {
    /// Records stored under any other version are never valid.
    pub policy_version: String,

    /// Lifetime of the authoritative flag set by accept and silent renewal.
    pub flag_ttl_days: u32,

    /// Visits older than this many calendar months are pruned.
    pub retention_months: u32,

    /// Average visits per month a visitor must exceed to count as frequent.
    pub frequent_visits_per_month: f64,

    /// When true, a still-valid flag does not survive a policy version bump:
    /// a stale record next to a valid flag clears the flag and shows the notice.
    pub version_bump_revokes_flag: bool,

    pub keys: StorageKeys,

    pub notice: NoticeCopy,
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            policy_version: DEFAULT_POLICY_VERSION.to_string(),
            flag_ttl_days: DEFAULT_FLAG_TTL_DAYS,
            retention_months: DEFAULT_RETENTION_MONTHS,
            frequent_visits_per_month: DEFAULT_FREQUENT_VISITS_PER_MONTH,
            version_bump_revokes_flag: true,
            keys: StorageKeys::default(),
            notice: NoticeCopy::default(),
        }
    }
}

/// Names under which state is persisted.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StorageKeys {
    pub record: String,
    pub visits: String,
    pub flag_name: String,
    pub flag_path: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            record: "cookieConsent".to_string(),
            visits: "visitorVisits".to_string(),
            flag_name: "cookieConsent".to_string(),
            flag_path: "/".to_string(),
        }
    }
}

/// Copy handed to whatever presents the notice.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NoticeCopy {
    pub text: String,
    pub accept_label: String,
    pub details_label: String,
    pub policy_link: String,
}

impl Default for NoticeCopy {
    fn default() -> Self {
        Self {
            text: "This site uses only the cookies necessary for security and basic \
                   functionality. We do not use tracking cookies for analytics or advertising."
                .to_string(),
            accept_label: "OK".to_string(),
            details_label: "View Cookies".to_string(),
            policy_link: "privacy.html#cookie-policy".to_string(),
        }
    }
}

impl ConsentConfig {
    /// Parse a YAML document. Missing fields take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a YAML config file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Load from an optional file, apply process environment overrides, validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = match path {
            Some(p) => Self::from_path(p)?,
            None => Self::default(),
        };
        cfg.apply_env_overrides(|var| std::env::var(var).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply overrides from a variable lookup (the process environment in `load`).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_POLICY_VERSION) {
            self.policy_version = v;
        }
        if let Some(v) = lookup(ENV_FLAG_TTL_DAYS) {
            self.flag_ttl_days = parse_env_u32(ENV_FLAG_TTL_DAYS, &v)?;
        }
        if let Some(v) = lookup(ENV_RETENTION_MONTHS) {
            self.retention_months = parse_env_u32(ENV_RETENTION_MONTHS, &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.policy_version.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "policy_version must not be empty".to_string(),
            ));
        }
        if self.flag_ttl_days == 0 || self.flag_ttl_days > MAX_FLAG_TTL_DAYS {
            return Err(ConfigError::Invalid(format!(
                "flag_ttl_days must be between 1 and {MAX_FLAG_TTL_DAYS}, got {}",
                self.flag_ttl_days
            )));
        }
        if self.retention_months == 0 {
            return Err(ConfigError::Invalid(
                "retention_months must be at least 1".to_string(),
            ));
        }
        if !self.frequent_visits_per_month.is_finite() || self.frequent_visits_per_month <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "frequent_visits_per_month must be a positive number, got {}",
                self.frequent_visits_per_month
            )));
        }
        if self.keys.record.is_empty() || self.keys.visits.is_empty() {
            return Err(ConfigError::Invalid(
                "storage keys must not be empty".to_string(),
            ));
        }
        if self.keys.record == self.keys.visits {
            return Err(ConfigError::Invalid(format!(
                "record and visits keys must differ (both '{}')",
                self.keys.record
            )));
        }
        if self.keys.flag_name.is_empty() || !self.keys.flag_path.starts_with('/') {
            return Err(ConfigError::Invalid(
                "flag_name must be set and flag_path must start with '/'".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env_u32(var: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|e| ConfigError::Env {
        var: var.to_string(),
        value: value.to_string(),
        message: e.to_string(),
    })
}
