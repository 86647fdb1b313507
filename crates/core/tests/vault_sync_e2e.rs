//! End-to-end tests for vault synchronization.
//!
//! These tests exercise the real `GitClient`, `SyncOrchestrator`, and
//! `SyncManager` with:
//! - Local bare Git repositories acting as the remote (pushed to by path)
//! - Real SQLite databases
//! - A real encrypted token keystore
//!
//! No network I/O: every remote is a bare repository on the local
//! filesystem.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::{IndexAddOption, Repository, Signature};
use tempfile::TempDir;

use vaultsync_core::config::{AppConfig, CommitIdentity};
use vaultsync_core::db::Database;
use vaultsync_core::exclusions::ExclusionPolicy;
use vaultsync_core::git::GitClient;
use vaultsync_core::keystore::TokenStore;
use vaultsync_core::models::NewRepository;
use vaultsync_core::provider::Provider;
use vaultsync_core::sync::SyncManager;

// ===========================================================================
// Helpers
// ===========================================================================

fn identity() -> CommitIdentity {
    CommitIdentity {
        name: "Test".into(),
        email: "test@test.com".into(),
    }
}

/// Create a bare "remote" seeded with one commit on `branch`.
///
/// Only `branch` exists on the remote afterwards, so clone-candidate tests
/// control exactly which names are clonable.
fn seed_remote(dir: &Path, branch: &str) -> PathBuf {
    let bare_path = dir.join(format!("remote-{branch}.git"));
    Repository::init_bare(&bare_path).unwrap();

    let seed_path = dir.join(format!("seed-{branch}"));
    let seed = Repository::init(&seed_path).unwrap();
    std::fs::write(seed_path.join("welcome.md"), "# vault\n").unwrap();

    let mut index = seed.index().unwrap();
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree_oid = index.write_tree().unwrap();
    let tree = seed.find_tree(tree_oid).unwrap();
    let sig = Signature::now("Seed", "seed@test.com").unwrap();
    let oid = seed
        .commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
        .unwrap();

    // Pin the branch name regardless of the default branch of `init`.
    let head_name = seed.head().unwrap().shorthand().unwrap().to_string();
    if head_name != branch {
        let commit = seed.find_commit(oid).unwrap();
        seed.branch(branch, &commit, true).unwrap();
        seed.set_head(&format!("refs/heads/{branch}")).unwrap();
    }

    let mut remote = seed
        .remote("origin", bare_path.to_str().unwrap())
        .unwrap();
    remote
        .push(
            &[&format!("refs/heads/{branch}:refs/heads/{branch}")],
            None,
        )
        .unwrap();

    let bare = Repository::open_bare(&bare_path).unwrap();
    bare.set_head(&format!("refs/heads/{branch}")).unwrap();

    bare_path
}

fn clone_vault(remote: &Path, target: &Path, preferred: Option<&str>) -> GitClient {
    GitClient::clone_vault(
        remote.to_str().unwrap(),
        target,
        None,
        preferred,
        ExclusionPolicy::allow_all(),
        identity(),
    )
    .unwrap()
}

fn remote_head_message(bare_path: &Path) -> String {
    let bare = Repository::open_bare(bare_path).unwrap();
    let head = bare.head().unwrap().peel_to_commit().unwrap();
    head.message().unwrap_or("").to_string()
}

// ===========================================================================
// Clone
// ===========================================================================

#[test]
fn test_clone_falls_back_to_master_without_reporting_earlier_failures() {
    let dir = TempDir::new().unwrap();
    let remote = seed_remote(dir.path(), "master");

    // "dev" and "main" do not exist; "master" does. The call succeeds and
    // nothing about the earlier attempts leaks into the result.
    let target = dir.path().join("vault");
    let client = clone_vault(&remote, &target, Some("dev"));

    assert_eq!(client.current_branch().unwrap(), "master");
    assert!(target.join("welcome.md").exists());
}

#[test]
fn test_clone_prefers_user_branch() {
    let dir = TempDir::new().unwrap();
    let remote = seed_remote(dir.path(), "dev");

    let target = dir.path().join("vault");
    let client = clone_vault(&remote, &target, Some("dev"));
    assert_eq!(client.current_branch().unwrap(), "dev");
}

#[test]
fn test_clone_empty_remote_collapses_to_generic_error() {
    let dir = TempDir::new().unwrap();
    let bare_path = dir.path().join("empty.git");
    Repository::init_bare(&bare_path).unwrap();

    let target = dir.path().join("vault");
    let err = GitClient::clone_vault(
        bare_path.to_str().unwrap(),
        &target,
        None,
        Some("dev"),
        ExclusionPolicy::allow_all(),
        identity(),
    )
    .unwrap_err();

    match err {
        vaultsync_core::errors::GitError::NoClonableBranch { attempted, .. } => {
            assert_eq!(attempted, vec!["dev", "main", "master"]);
        }
        other => panic!("expected NoClonableBranch, got {other:?}"),
    }
    // No partial checkout may remain behind.
    assert!(!target.exists());
}

// ===========================================================================
// Pull & push
// ===========================================================================

#[test]
fn test_pull_up_to_date() {
    let dir = TempDir::new().unwrap();
    let remote = seed_remote(dir.path(), "main");
    let client = clone_vault(&remote, &dir.path().join("vault"), None);

    assert_eq!(client.pull(None).unwrap(), "Already up to date.");
}

#[test]
fn test_pull_fast_forwards_remote_changes() {
    let dir = TempDir::new().unwrap();
    let remote = seed_remote(dir.path(), "main");
    let vault_a = clone_vault(&remote, &dir.path().join("vault-a"), None);
    let vault_b = clone_vault(&remote, &dir.path().join("vault-b"), None);

    std::fs::write(vault_b.workdir().join("from-b.md"), "hello from b").unwrap();
    vault_b.push(None, "add from-b").unwrap();

    let summary = vault_a.pull(None).unwrap();
    assert!(summary.starts_with("Fast-forwarded"), "got: {summary}");
    assert!(vault_a.workdir().join("from-b.md").exists());
}

#[test]
fn test_pull_merges_diverged_histories() {
    let dir = TempDir::new().unwrap();
    let remote = seed_remote(dir.path(), "main");
    let vault_a = clone_vault(&remote, &dir.path().join("vault-a"), None);
    let vault_b = clone_vault(&remote, &dir.path().join("vault-b"), None);

    std::fs::write(vault_b.workdir().join("from-b.md"), "b").unwrap();
    vault_b.push(None, "add from-b").unwrap();

    // Local commit without pushing: histories diverge on different files.
    std::fs::write(vault_a.workdir().join("from-a.md"), "a").unwrap();
    vault_a.stage_and_commit("add from-a").unwrap();

    let summary = vault_a.pull(None).unwrap();
    assert!(summary.starts_with("Merged remote changes"), "got: {summary}");
    assert!(vault_a.workdir().join("from-a.md").exists());
    assert!(vault_a.workdir().join("from-b.md").exists());
}

#[test]
fn test_push_publishes_commit() {
    let dir = TempDir::new().unwrap();
    let remote = seed_remote(dir.path(), "main");
    let client = clone_vault(&remote, &dir.path().join("vault"), None);

    std::fs::write(client.workdir().join("note.md"), "note body").unwrap();
    client.push(None, "add note").unwrap();

    assert_eq!(remote_head_message(&remote), "add note");
}

// ===========================================================================
// Full sync via the manager
// ===========================================================================

struct Fixture {
    _dir: TempDir,
    remote: PathBuf,
    vault: PathBuf,
    manager: SyncManager,
    repo_id: i64,
}

fn full_fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let remote = seed_remote(dir.path(), "main");
    let vault = dir.path().join("vault");
    clone_vault(&remote, &vault, None);

    let db = Arc::new(Database::in_memory().unwrap());
    db.initialize().unwrap();
    let tokens = Arc::new(TokenStore::open(dir.path().join("keystore")).unwrap());
    let manager = SyncManager::new(db, tokens, &AppConfig::default());

    let repo = manager
        .db()
        .insert_repository(&NewRepository {
            name: "notes".into(),
            remote_url: remote.to_string_lossy().into_owned(),
            local_path: vault.clone(),
            provider: Provider::GitHub,
            auto_sync: false,
            sync_interval_minutes: 30,
            exclude_patterns: vec![],
        })
        .unwrap();
    manager.tokens().put_token(repo.id, "file-remote-token").unwrap();

    Fixture {
        _dir: dir,
        remote,
        vault,
        manager,
        repo_id: repo.id,
    }
}

#[tokio::test]
async fn test_sync_pushes_local_changes_and_advances_timestamp() {
    let fx = full_fixture();
    std::fs::write(fx.vault.join("daily.md"), "today's notes").unwrap();

    let outcome = fx.manager.sync_repository(fx.repo_id).await.unwrap();
    assert!(outcome.success);
    assert!(outcome.pushed);
    assert_eq!(outcome.pull_message, "Already up to date.");

    let repo = fx.manager.db().get_repository(fx.repo_id).unwrap().unwrap();
    assert!(repo.last_sync_at > 0, "successful push must set last_sync_at");

    let records = fx.manager.db().recent_sync_records(fx.repo_id).unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].success);

    // The vault's commit actually reached the remote.
    let bare = Repository::open_bare(&fx.remote).unwrap();
    let tree = bare.head().unwrap().peel_to_tree().unwrap();
    assert!(tree.get_name("daily.md").is_some());
}

#[tokio::test]
async fn test_sync_pulls_remote_changes_before_pushing() {
    let fx = full_fixture();

    // Another device pushes first.
    let other = clone_vault(&fx.remote, fx._dir.path().join("other").as_path(), None);
    std::fs::write(other.workdir().join("from-other.md"), "o").unwrap();
    other.push(None, "from other device").unwrap();

    std::fs::write(fx.vault.join("local.md"), "l").unwrap();
    let outcome = fx.manager.sync_repository(fx.repo_id).await.unwrap();
    assert!(outcome.success);
    assert!(outcome.pull_message.starts_with("Fast-forwarded"));

    // Both changes end up in the local vault and on the remote.
    assert!(fx.vault.join("from-other.md").exists());
    let bare = Repository::open_bare(&fx.remote).unwrap();
    let tree = bare.head().unwrap().peel_to_tree().unwrap();
    assert!(tree.get_name("local.md").is_some());
    assert!(tree.get_name("from-other.md").is_some());
}

#[tokio::test]
async fn test_second_sync_creates_empty_commit() {
    let fx = full_fixture();

    fx.manager.sync_repository(fx.repo_id).await.unwrap();
    let first_head = remote_head_sha(&fx.remote);

    // Nothing changed locally; the sync still commits and pushes.
    fx.manager.sync_repository(fx.repo_id).await.unwrap();
    let second_head = remote_head_sha(&fx.remote);
    assert_ne!(first_head, second_head);

    let records = fx.manager.db().recent_sync_records(fx.repo_id).unwrap();
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn test_missing_token_after_delete_fails_fast() {
    let fx = full_fixture();
    fx.manager.tokens().delete_token(fx.repo_id).unwrap();

    let err = fx.manager.sync_repository(fx.repo_id).await.unwrap_err();
    assert!(matches!(
        err,
        vaultsync_core::errors::SyncError::MissingToken(_)
    ));

    let repo = fx.manager.db().get_repository(fx.repo_id).unwrap().unwrap();
    assert_eq!(repo.last_sync_at, 0);
}

fn remote_head_sha(bare_path: &Path) -> String {
    let bare = Repository::open_bare(bare_path).unwrap();
    let sha = bare
        .head()
        .unwrap()
        .peel_to_commit()
        .unwrap()
        .id()
        .to_string();
    sha
}
