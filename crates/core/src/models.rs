//! Domain model types used throughout VaultSync.
//!
//! These types bridge the sync orchestration, database layer, and CLI.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::provider::Provider;

// ---------------------------------------------------------------------------
// Repository configuration
// ---------------------------------------------------------------------------

/// Persistent configuration for one synchronized vault.
///
/// The access token is deliberately absent: it lives in the encrypted
/// keystore, keyed by `id`, with its own lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Store-generated identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Remote clone/push URL.
    pub remote_url: String,
    /// Local working directory of the vault.
    pub local_path: PathBuf,
    /// Hosting provider.
    pub provider: Provider,
    /// Unix milliseconds of the last successful push; 0 = never synced.
    pub last_sync_at: i64,
    /// Whether recurring background sync is enabled.
    pub auto_sync: bool,
    /// Recurring sync interval in minutes.
    pub sync_interval_minutes: u32,
    /// Glob patterns excluded from staging and status.
    pub exclude_patterns: Vec<String>,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl RepositoryConfig {
    /// `true` if this repository has ever completed a sync.
    pub fn has_synced(&self) -> bool {
        self.last_sync_at > 0
    }
}

/// Fields needed to create a new repository row (the store assigns the id).
#[derive(Debug, Clone)]
pub struct NewRepository {
    pub name: String,
    pub remote_url: String,
    pub local_path: PathBuf,
    pub provider: Provider,
    pub auto_sync: bool,
    pub sync_interval_minutes: u32,
    pub exclude_patterns: Vec<String>,
}

// ---------------------------------------------------------------------------
// Sync history
// ---------------------------------------------------------------------------

/// Which operation a history record describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Pull,
    Push,
    Sync,
}

impl SyncAction {
    /// Parse an action string as stored in the database.
    pub fn from_str_val(s: &str) -> Self {
        match s {
            "pull" => Self::Pull,
            "push" => Self::Push,
            _ => Self::Sync,
        }
    }
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pull => write!(f, "pull"),
            Self::Push => write!(f, "push"),
            Self::Sync => write!(f, "sync"),
        }
    }
}

/// One append-only entry in a repository's sync history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRecord {
    pub id: String,
    pub repo_id: i64,
    /// Unix milliseconds.
    pub timestamp: i64,
    pub action: SyncAction,
    pub success: bool,
    pub message: String,
}

impl SyncRecord {
    /// Build an unsaved record stamped with the current time.
    pub fn now(repo_id: i64, action: SyncAction, success: bool, message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            repo_id,
            timestamp: Utc::now().timestamp_millis(),
            action,
            success,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sync outcome (transient)
// ---------------------------------------------------------------------------

/// Result of one pull-then-push invocation. Not persisted; the sync
/// manager converts it into a [`SyncRecord`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub message: String,
    /// Pull's success summary; empty when pull itself failed.
    pub pull_message: String,
    pub pushed: bool,
}

// ---------------------------------------------------------------------------
// Working-tree status (transient)
// ---------------------------------------------------------------------------

/// Snapshot of a vault's working-tree changes, exclusions already applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultStatus {
    pub modified: Vec<String>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub untracked: Vec<String>,
    pub has_changes: bool,
}

// ---------------------------------------------------------------------------
// Provider REST payloads (display-only)
// ---------------------------------------------------------------------------

/// A remote repository as listed by a provider API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteRepo {
    pub full_name: String,
    #[serde(alias = "clone_url", alias = "html_url")]
    pub clone_url: String,
    pub private: bool,
    #[serde(default)]
    pub description: Option<String>,
}

/// The authenticated user as reported by a provider API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderUser {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}
