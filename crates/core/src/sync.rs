//! Pull-then-push sync orchestration.
//!
//! [`SyncOrchestrator`] sequences one pull-then-push cycle for a working
//! directory and shapes the result into a [`SyncOutcome`]. [`SyncManager`]
//! is the caller-side collaborator: it loads config and token, serializes
//! syncs per repository id, converts outcomes into history records, and
//! advances the last-sync timestamp only after a successful push.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

use crate::config::{AppConfig, CommitIdentity};
use crate::db::Database;
use crate::errors::SyncError;
use crate::exclusions::ExclusionPolicy;
use crate::git::{GitAuth, GitClient};
use crate::keystore::TokenStore;
use crate::models::{RepositoryConfig, SyncAction, SyncOutcome, SyncRecord, VaultStatus};

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Sequences pull → push for one working directory.
pub struct SyncOrchestrator {
    identity: CommitIdentity,
}

impl SyncOrchestrator {
    pub fn new(identity: CommitIdentity) -> Self {
        Self { identity }
    }

    /// Run one pull-then-push cycle.
    ///
    /// An empty token fails before any git call. Pull runs first, but its
    /// failure never aborts the push attempt — that is a design choice,
    /// not error-swallowing: a failed pull is logged, and only pull's
    /// success payload is captured in the outcome. If push fails, the
    /// overall result is the push error; pull's error is never surfaced
    /// in it.
    pub async fn sync(
        &self,
        local_path: &Path,
        auth: &GitAuth,
        commit_message: &str,
        exclusions: &ExclusionPolicy,
    ) -> Result<SyncOutcome, SyncError> {
        if auth.token.is_empty() {
            return Err(SyncError::MissingToken(local_path.display().to_string()));
        }

        let client = GitClient::open(local_path, exclusions.clone(), self.identity.clone())?;

        let pull_message = match client.pull(Some(auth)) {
            Ok(summary) => summary,
            Err(e) => {
                warn!(path = %local_path.display(), error = %e, "pull failed, continuing to push");
                String::new()
            }
        };

        if let Err(e) = client.push(Some(auth), commit_message) {
            return Err(SyncError::PushFailed(e));
        }

        Ok(SyncOutcome {
            success: true,
            message: "sync completed".to_string(),
            pull_message,
            pushed: true,
        })
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Owns record writing and timestamps around the orchestrator.
///
/// Sync operations for the same repository id are serialized through a
/// per-id async mutex, so a manual sync and a scheduled sync can never
/// overlap on one working directory; different repositories run
/// concurrently.
pub struct SyncManager {
    db: Arc<Database>,
    tokens: Arc<TokenStore>,
    orchestrator: SyncOrchestrator,
    identity: CommitIdentity,
    commit_message_prefix: String,
    locks: StdMutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

impl SyncManager {
    pub fn new(db: Arc<Database>, tokens: Arc<TokenStore>, config: &AppConfig) -> Self {
        let identity = config.commit_identity();
        Self {
            db,
            tokens,
            orchestrator: SyncOrchestrator::new(identity.clone()),
            identity,
            commit_message_prefix: config.sync.commit_message_prefix.clone(),
            locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Return a reference to the store.
    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    /// Return a reference to the token keystore.
    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Pull-then-push one repository and record the outcome.
    ///
    /// `last_sync_at` moves only when the push succeeded.
    pub async fn sync_repository(&self, repo_id: i64) -> Result<SyncOutcome, SyncError> {
        let lock = self.repo_lock(repo_id);
        let _guard = lock.lock().await;

        let (repo, auth) = self.load(repo_id, SyncAction::Sync)?;
        let exclusions = ExclusionPolicy::new(repo.exclude_patterns.clone());
        let message = self.commit_message();

        let result = self
            .orchestrator
            .sync(&repo.local_path, &auth, &message, &exclusions)
            .await;

        match &result {
            Ok(outcome) => {
                self.db.append_sync_record(&SyncRecord::now(
                    repo_id,
                    SyncAction::Sync,
                    outcome.success,
                    outcome.message.clone(),
                ))?;
                if outcome.success && outcome.pushed {
                    self.db
                        .touch_last_sync(repo_id, Utc::now().timestamp_millis())?;
                }
                info!(repo_id, name = %repo.name, "sync completed");
            }
            Err(e) => {
                let _ = self.db.append_sync_record(&SyncRecord::now(
                    repo_id,
                    SyncAction::Sync,
                    false,
                    e.to_string(),
                ));
                error!(repo_id, name = %repo.name, error = %e, "sync failed");
            }
        }
        result
    }

    /// Pull-only operation. Never touches `last_sync_at`.
    pub async fn pull_repository(&self, repo_id: i64) -> Result<String, SyncError> {
        let lock = self.repo_lock(repo_id);
        let _guard = lock.lock().await;

        let (repo, auth) = self.load(repo_id, SyncAction::Pull)?;
        let exclusions = ExclusionPolicy::new(repo.exclude_patterns.clone());

        let result = GitClient::open(&repo.local_path, exclusions, self.identity.clone())
            .and_then(|client| client.pull(Some(&auth)))
            .map_err(SyncError::from);

        match &result {
            Ok(summary) => {
                self.db.append_sync_record(&SyncRecord::now(
                    repo_id,
                    SyncAction::Pull,
                    true,
                    summary.clone(),
                ))?;
            }
            Err(e) => {
                let _ = self.db.append_sync_record(&SyncRecord::now(
                    repo_id,
                    SyncAction::Pull,
                    false,
                    e.to_string(),
                ));
            }
        }
        result
    }

    /// Push-only operation. Advances `last_sync_at` on success.
    pub async fn push_repository(&self, repo_id: i64) -> Result<(), SyncError> {
        let lock = self.repo_lock(repo_id);
        let _guard = lock.lock().await;

        let (repo, auth) = self.load(repo_id, SyncAction::Push)?;
        let exclusions = ExclusionPolicy::new(repo.exclude_patterns.clone());
        let message = self.commit_message();

        let result = GitClient::open(&repo.local_path, exclusions, self.identity.clone())
            .map_err(SyncError::from)
            .and_then(|client| {
                client
                    .push(Some(&auth), &message)
                    .map_err(SyncError::PushFailed)
            });

        match &result {
            Ok(()) => {
                self.db.append_sync_record(&SyncRecord::now(
                    repo_id,
                    SyncAction::Push,
                    true,
                    "pushed local changes",
                ))?;
                self.db
                    .touch_last_sync(repo_id, Utc::now().timestamp_millis())?;
            }
            Err(e) => {
                let _ = self.db.append_sync_record(&SyncRecord::now(
                    repo_id,
                    SyncAction::Push,
                    false,
                    e.to_string(),
                ));
            }
        }
        result
    }

    /// Working-tree status of one repository (no history record).
    pub fn status_repository(&self, repo_id: i64) -> Result<VaultStatus, SyncError> {
        let repo = self
            .db
            .get_repository(repo_id)?
            .ok_or(SyncError::RepositoryNotFound(repo_id))?;
        let exclusions = ExclusionPolicy::new(repo.exclude_patterns.clone());
        let client = GitClient::open(&repo.local_path, exclusions, self.identity.clone())?;
        Ok(client.status()?)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Load config and token; failures here are precondition errors and
    /// never reach the git client.
    fn load(
        &self,
        repo_id: i64,
        action: SyncAction,
    ) -> Result<(RepositoryConfig, GitAuth), SyncError> {
        let repo = self
            .db
            .get_repository(repo_id)?
            .ok_or(SyncError::RepositoryNotFound(repo_id))?;
        match self.tokens.get_token(repo_id)? {
            Some(token) => {
                let auth = GitAuth {
                    username: repo.provider.credential_username().to_string(),
                    token,
                };
                Ok((repo, auth))
            }
            None => {
                let err = SyncError::MissingToken(repo.name.clone());
                // History shows the same message the caller sees.
                let _ = self.db.append_sync_record(&SyncRecord::now(
                    repo_id,
                    action,
                    false,
                    err.to_string(),
                ));
                Err(err)
            }
        }
    }

    fn repo_lock(&self, repo_id: i64) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(repo_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn commit_message(&self) -> String {
        format!(
            "{} synced at {}",
            self.commit_message_prefix,
            Utc::now().to_rfc3339()
        )
    }
}
