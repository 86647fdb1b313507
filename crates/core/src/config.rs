//! TOML-based configuration for VaultSync.
//!
//! The loaded [`AppConfig`] is passed explicitly to every component at
//! construction; there is no process-global configuration state. Every
//! field has a default so a missing config file yields a usable setup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage and logging settings.
    #[serde(default)]
    pub app: AppSection,

    /// Sync behaviour settings.
    #[serde(default)]
    pub sync: SyncSection,

    /// Background scheduler settings (consumed by the daemon).
    #[serde(default)]
    pub scheduler: SchedulerSection,
}

// ---------------------------------------------------------------------------
// [app]
// ---------------------------------------------------------------------------

/// Storage and logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSection {
    /// Directory holding the database and keystore files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vaultsync")
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// [sync]
// ---------------------------------------------------------------------------

/// Sync behaviour configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSection {
    /// Commit author/committer name.
    #[serde(default = "default_committer_name")]
    pub committer_name: String,

    /// Commit author/committer email.
    #[serde(default = "default_committer_email")]
    pub committer_email: String,

    /// Prefix for generated commit messages.
    #[serde(default = "default_commit_prefix")]
    pub commit_message_prefix: String,
}

fn default_committer_name() -> String {
    "VaultSync".into()
}
fn default_committer_email() -> String {
    "vaultsync@localhost".into()
}
fn default_commit_prefix() -> String {
    "vaultsync:".into()
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            committer_name: default_committer_name(),
            committer_email: default_committer_email(),
            commit_message_prefix: default_commit_prefix(),
        }
    }
}

/// Name/email pair used for generated commits.
#[derive(Debug, Clone)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

impl From<&SyncSection> for CommitIdentity {
    fn from(s: &SyncSection) -> Self {
        Self {
            name: s.committer_name.clone(),
            email: s.committer_email.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// [scheduler]
// ---------------------------------------------------------------------------

/// Background scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSection {
    /// Host probed to decide whether the network is reachable.
    #[serde(default = "default_connectivity_host")]
    pub connectivity_host: String,

    /// Port probed on `connectivity_host`.
    #[serde(default = "default_connectivity_port")]
    pub connectivity_port: u16,

    /// Skip the connectivity probe and assume the network is up.
    #[serde(default)]
    pub assume_online: bool,

    /// Maximum attempts for a failing scheduled sync before giving up.
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    /// Base delay in seconds for exponential retry backoff.
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_secs: u64,

    /// Seconds between store scans reconciling auto-sync schedules.
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,
}

fn default_connectivity_host() -> String {
    "github.com".into()
}
fn default_connectivity_port() -> u16 {
    443
}
fn default_retry_max_attempts() -> u32 {
    3
}
fn default_retry_base_delay() -> u64 {
    30
}
fn default_reconcile_interval() -> u64 {
    60
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            connectivity_host: default_connectivity_host(),
            connectivity_port: default_connectivity_port(),
            assume_online: false,
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay_secs: default_retry_base_delay(),
            reconcile_interval_secs: default_reconcile_interval(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        info!(path = %path.display(), "loading configuration");
        let raw = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        debug!("configuration parsed");
        Ok(config)
    }

    /// Load from `path` if given and present; defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => Ok(Self::default()),
        }
    }

    /// Validate field values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.committer_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "sync.committer_name".into(),
                detail: "must not be empty".into(),
            });
        }
        if self.sync.committer_email.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "sync.committer_email".into(),
                detail: "must not be empty".into(),
            });
        }
        if self.scheduler.retry_max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.retry_max_attempts".into(),
                detail: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Path of the SQLite database inside the data directory.
    pub fn db_path(&self) -> PathBuf {
        self.app.data_dir.join("vaultsync.db")
    }

    /// Commit identity derived from the sync section.
    pub fn commit_identity(&self) -> CommitIdentity {
        CommitIdentity::from(&self.sync)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.sync.committer_name, "VaultSync");
        assert_eq!(config.scheduler.connectivity_port, 443);
        assert!(config.db_path().ends_with("vaultsync.db"));
    }

    #[test]
    fn test_load_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [app]
            log_level = "debug"

            [scheduler]
            assume_online = true
            retry_max_attempts = 5
            "#,
        )
        .unwrap();

        let config = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(config.app.log_level, "debug");
        assert!(config.scheduler.assume_online);
        assert_eq!(config.scheduler.retry_max_attempts, 5);
        // Untouched sections keep their defaults.
        assert_eq!(config.sync.commit_message_prefix, "vaultsync:");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = AppConfig::load_from_file("/nonexistent/config.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_or_default_without_path() {
        let config = AppConfig::load_or_default(None).unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_validation_rejects_empty_committer() {
        let mut config = AppConfig::default();
        config.sync.committer_name = "  ".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_validation_rejects_zero_retries() {
        let mut config = AppConfig::default();
        config.scheduler.retry_max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
