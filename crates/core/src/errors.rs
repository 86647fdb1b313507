//! Error types for the VaultSync core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Keystore(#[from] KeystoreError),
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from local Git (git2) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The vault path does not exist or is not a git repository.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// Clone target path already exists on disk.
    ///
    /// Raised before any libgit2 call is made.
    #[error("local path '{0}' already exists")]
    LocalPathExists(String),

    /// None of the candidate branches could be cloned.
    ///
    /// Per-branch failures are collapsed into this single error; only the
    /// list of attempted branch names is retained.
    #[error("no clonable branch for '{url}' (tried: {})", attempted.join(", "))]
    NoClonableBranch { url: String, attempted: Vec<String> },

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// A ref (branch, HEAD) could not be resolved.
    #[error("git ref not found: {0}")]
    RefNotFound(String),

    /// Push was rejected by the remote (e.g. non-fast-forward).
    #[error("git push rejected for branch '{branch}': {detail}")]
    PushRejected { branch: String, detail: String },

    /// Pulling remote changes produced conflicting edits.
    #[error("git merge conflict: {0}")]
    MergeConflict(String),

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Provider API errors
// ---------------------------------------------------------------------------

/// Errors from hosting-provider REST API interactions.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP-level transport error (network, TLS, etc.).
    #[error("provider HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The API returned a non-success status code.
    #[error("provider API error (HTTP {status}): {body}")]
    ApiError { status: u16, body: String },

    /// The access token is missing or was rejected.
    #[error("provider authentication failed: {0}")]
    AuthenticationFailed(String),

    /// JSON deserialization failure.
    #[error("provider response parse error: {0}")]
    ParseError(String),
}

// ---------------------------------------------------------------------------
// Sync errors
// ---------------------------------------------------------------------------

/// Errors from the pull-then-push sync orchestration.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No repository with the given id is configured.
    #[error("repository {0} not found")]
    RepositoryNotFound(i64),

    /// No access token is available; raised before any git call is made.
    #[error("no access token available for '{0}'")]
    MissingToken(String),

    /// The push step failed; the overall sync fails with the push error,
    /// whatever happened during pull.
    #[error("sync push failed: {0}")]
    PushFailed(#[source] GitError),

    /// Underlying git error outside the push step (open, pull setup).
    #[error(transparent)]
    Git(#[from] GitError),

    /// Database error while loading config or recording history.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Keystore error while loading the token.
    #[error(transparent)]
    Keystore(#[from] KeystoreError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Database errors
// ---------------------------------------------------------------------------

/// Errors from the SQLite persistence layer.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Underlying rusqlite error.
    #[error("database error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// A migration failed.
    #[error("database migration failed (version {version}): {detail}")]
    MigrationFailed { version: u32, detail: String },

    /// A record was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Generic I/O error (e.g. file permissions).
    #[error("database I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Keystore errors
// ---------------------------------------------------------------------------

/// Errors from the encrypted token keystore.
#[derive(Debug, Error)]
pub enum KeystoreError {
    /// The key file exists but does not hold a valid 32-byte key.
    #[error("invalid keystore key at '{path}': {detail}")]
    InvalidKey { path: String, detail: String },

    /// Decryption failed (wrong key, truncated or tampered file).
    #[error("keystore decryption failed: {0}")]
    DecryptionFailed(String),

    /// Encryption failed.
    #[error("keystore encryption failed: {0}")]
    EncryptionFailed(String),

    /// The token file payload is not valid JSON.
    #[error("keystore parse error: {0}")]
    ParseError(String),

    /// Generic I/O error.
    #[error("keystore I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = GitError::LocalPathExists("/tmp/vault".into());
        assert_eq!(err.to_string(), "local path '/tmp/vault' already exists");

        let err = GitError::NoClonableBranch {
            url: "https://github.com/a/b.git".into(),
            attempted: vec!["dev".into(), "main".into(), "master".into()],
        };
        assert_eq!(
            err.to_string(),
            "no clonable branch for 'https://github.com/a/b.git' (tried: dev, main, master)"
        );

        let err = SyncError::MissingToken("notes".into());
        assert!(err.to_string().contains("no access token"));

        let err = DatabaseError::NotFound {
            entity: "repository".into(),
            id: "7".into(),
        };
        assert_eq!(err.to_string(), "repository not found: 7");
    }

    #[test]
    fn test_push_failure_message_derives_from_git_error() {
        let git_err = GitError::PushRejected {
            branch: "main".into(),
            detail: "non-fast-forward".into(),
        };
        let err = SyncError::PushFailed(git_err);
        assert!(err.to_string().contains("sync push failed"));
        assert!(err.to_string().contains("non-fast-forward"));
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let git_err = GitError::RepositoryNotFound("/tmp/x".into());
        let core_err: CoreError = git_err.into();
        assert!(matches!(core_err, CoreError::Git(_)));

        let ks_err = KeystoreError::DecryptionFailed("aead".into());
        let core_err: CoreError = ks_err.into();
        assert!(matches!(core_err, CoreError::Keystore(_)));
    }
}
