//! Local vault Git operations via `git2`.
//!
//! One [`GitClient`] wraps one working directory. Clone tries a fixed list
//! of candidate branches; pull is fetch + merge-analysis (fast-forward when
//! possible, real merge otherwise, conflicts delegated to libgit2); push is
//! stage-commit-push with exclusion patterns applied at staging time.

use std::path::{Path, PathBuf};

use git2::{
    Cred, FetchOptions, IndexAddOption, Oid, PushOptions, RemoteCallbacks, Repository, Signature,
    Status, StatusOptions,
};
use tracing::{debug, info, instrument, warn};

use crate::config::CommitIdentity;
use crate::errors::GitError;
use crate::exclusions::ExclusionPolicy;
use crate::models::VaultStatus;

/// Username/token pair for HTTPS remotes. The username is the provider's
/// credential username, not an account name.
#[derive(Debug, Clone)]
pub struct GitAuth {
    pub username: String,
    pub token: String,
}

/// High-level Git client for one vault working directory.
pub struct GitClient {
    repo: Repository,
    workdir: PathBuf,
    exclusions: ExclusionPolicy,
    identity: CommitIdentity,
}

impl std::fmt::Debug for GitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitClient")
            .field("workdir", &self.workdir)
            .field("exclusions", &self.exclusions)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

fn make_callbacks(auth: Option<&GitAuth>) -> RemoteCallbacks<'static> {
    let mut callbacks = RemoteCallbacks::new();
    if let Some(auth) = auth {
        let auth = auth.clone();
        callbacks.credentials(move |_url, _username, _allowed| {
            Cred::userpass_plaintext(&auth.username, &auth.token)
        });
    }
    callbacks
}

fn short(oid: Oid) -> String {
    oid.to_string().chars().take(7).collect()
}

impl GitClient {
    /// Open an existing vault repository at `path`.
    pub fn open<P: AsRef<Path>>(
        path: P,
        exclusions: ExclusionPolicy,
        identity: CommitIdentity,
    ) -> Result<Self, GitError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening vault repository");
        let repo = Repository::open(path)
            .map_err(|_| GitError::RepositoryNotFound(path.display().to_string()))?;
        Ok(Self {
            repo,
            workdir: path.to_path_buf(),
            exclusions,
            identity,
        })
    }

    /// Clone a remote vault to `path`, trying candidate branches in order
    /// [preferred (if given), "main", "master"].
    ///
    /// Fails with [`GitError::LocalPathExists`] before any libgit2 call if
    /// `path` is already present. When every candidate fails, the
    /// per-branch errors are collapsed into a single
    /// [`GitError::NoClonableBranch`] retaining only the attempted names.
    #[instrument(skip(auth, exclusions, identity), fields(url = %url, path = %path.display()))]
    pub fn clone_vault(
        url: &str,
        path: &Path,
        auth: Option<&GitAuth>,
        preferred_branch: Option<&str>,
        exclusions: ExclusionPolicy,
        identity: CommitIdentity,
    ) -> Result<Self, GitError> {
        if path.exists() {
            return Err(GitError::LocalPathExists(path.display().to_string()));
        }

        let mut candidates: Vec<String> = Vec::new();
        if let Some(branch) = preferred_branch {
            if !branch.is_empty() {
                candidates.push(branch.to_string());
            }
        }
        for fallback in ["main", "master"] {
            if !candidates.iter().any(|c| c == fallback) {
                candidates.push(fallback.to_string());
            }
        }

        let mut attempted = Vec::new();
        for branch in &candidates {
            attempted.push(branch.clone());
            info!(branch = branch.as_str(), "attempting clone");

            let mut fetch_opts = FetchOptions::new();
            fetch_opts.remote_callbacks(make_callbacks(auth));
            let mut builder = git2::build::RepoBuilder::new();
            builder.fetch_options(fetch_opts);
            builder.branch(branch);

            match builder.clone(url, path) {
                Ok(repo) => {
                    info!(branch = branch.as_str(), "clone completed");
                    return Ok(Self {
                        repo,
                        workdir: path.to_path_buf(),
                        exclusions,
                        identity,
                    });
                }
                Err(e) => {
                    debug!(branch = branch.as_str(), error = %e, "branch attempt failed");
                    // A failed attempt can leave a partial checkout behind.
                    if path.exists() {
                        let _ = std::fs::remove_dir_all(path);
                    }
                }
            }
        }

        Err(GitError::NoClonableBranch {
            url: url.to_string(),
            attempted,
        })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Name of the branch HEAD points at, even when it is unborn.
    pub fn current_branch(&self) -> Result<String, GitError> {
        match self.repo.head() {
            Ok(head) => head
                .shorthand()
                .map(str::to_string)
                .ok_or_else(|| GitError::RefNotFound("HEAD".into())),
            Err(_) => {
                let head = self.repo.find_reference("HEAD")?;
                let target = head
                    .symbolic_target()
                    .ok_or_else(|| GitError::RefNotFound("HEAD".into()))?;
                Ok(target.trim_start_matches("refs/heads/").to_string())
            }
        }
    }

    /// SHA of the current HEAD commit.
    pub fn head_sha(&self) -> Result<String, GitError> {
        let head = self.repo.head()?;
        Ok(head.peel_to_commit()?.id().to_string())
    }

    // -----------------------------------------------------------------------
    // Pull
    // -----------------------------------------------------------------------

    /// Fetch `origin` and merge the remote branch into the local one.
    ///
    /// Returns a one-line summary. Merge strategy is libgit2's; conflicting
    /// changes surface as [`GitError::MergeConflict`] with the merge state
    /// cleaned up.
    #[instrument(skip(self, auth))]
    pub fn pull(&self, auth: Option<&GitAuth>) -> Result<String, GitError> {
        let branch = self.current_branch()?;
        info!(branch = branch.as_str(), "pulling");

        let mut remote = self.repo.find_remote("origin")?;
        let mut fetch_opts = FetchOptions::new();
        fetch_opts.remote_callbacks(make_callbacks(auth));
        // Empty refspec list = the remote's configured base refspecs, which
        // keep refs/remotes/origin/* up to date.
        remote.fetch(&[] as &[&str], Some(&mut fetch_opts), None)?;

        let remote_ref = format!("refs/remotes/origin/{branch}");
        let fetch_commit = self.repo.find_reference(&remote_ref)?.peel_to_commit()?;
        let annotated = self.repo.find_annotated_commit(fetch_commit.id())?;
        let (analysis, _) = self.repo.merge_analysis(&[&annotated])?;

        if analysis.is_up_to_date() {
            debug!("nothing to pull");
            return Ok("Already up to date.".to_string());
        }

        if analysis.is_fast_forward() {
            let refname = format!("refs/heads/{branch}");
            let mut reference = self.repo.find_reference(&refname)?;
            let old = reference.peel_to_commit()?.id();
            reference.set_target(fetch_commit.id(), "vaultsync: fast-forward pull")?;
            self.repo.set_head(&refname)?;
            self.repo
                .checkout_head(Some(git2::build::CheckoutBuilder::new().force()))?;
            info!("fast-forward pull completed");
            return Ok(format!(
                "Fast-forwarded {}..{}",
                short(old),
                short(fetch_commit.id())
            ));
        }

        // Diverged histories: real merge, conflicts are fatal to the pull.
        self.repo.merge(
            &[&annotated],
            None,
            Some(git2::build::CheckoutBuilder::new().allow_conflicts(true)),
        )?;
        let mut index = self.repo.index()?;
        if index.has_conflicts() {
            self.repo.cleanup_state()?;
            return Err(GitError::MergeConflict(format!(
                "conflicting changes while pulling '{branch}'"
            )));
        }
        let tree_oid = index.write_tree_to(&self.repo)?;
        let tree = self.repo.find_tree(tree_oid)?;
        let head_commit = self.repo.head()?.peel_to_commit()?;
        let sig = self.signature()?;
        self.repo.commit(
            Some("HEAD"),
            &sig,
            &sig,
            &format!("Merge remote branch '{branch}'"),
            &tree,
            &[&head_commit, &fetch_commit],
        )?;
        self.repo.cleanup_state()?;
        self.repo
            .checkout_head(Some(git2::build::CheckoutBuilder::new().force()))?;
        info!("merge pull completed");
        Ok(format!("Merged remote changes into '{branch}'"))
    }

    // -----------------------------------------------------------------------
    // Commit & push
    // -----------------------------------------------------------------------

    /// Stage all changes (exclusion patterns skipped) and create a commit.
    ///
    /// A commit is created even when nothing changed; that empty commit is
    /// intentional and not guarded against.
    #[instrument(skip(self, message))]
    pub fn stage_and_commit(&self, message: &str) -> Result<Oid, GitError> {
        let mut index = self.repo.index()?;

        let exclusions = &self.exclusions;
        let mut skip_excluded = |path: &Path, _matched: &[u8]| -> i32 {
            if exclusions.is_excluded(&path.to_string_lossy()) {
                1
            } else {
                0
            }
        };
        index.add_all(
            ["*"].iter(),
            IndexAddOption::DEFAULT,
            Some(&mut skip_excluded),
        )?;
        // Pick up deletions of already-tracked files.
        let mut skip_excluded = |path: &Path, _matched: &[u8]| -> i32 {
            if exclusions.is_excluded(&path.to_string_lossy()) {
                1
            } else {
                0
            }
        };
        index.update_all(["*"].iter(), Some(&mut skip_excluded))?;
        index.write()?;

        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;
        let sig = self.signature()?;
        let parent_commit = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(_) => None,
        };
        let parents: Vec<&git2::Commit> = parent_commit.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
        info!(sha = %oid, "created commit");
        Ok(oid)
    }

    /// Stage all changes, commit with `message`, and push the current
    /// branch to `origin`.
    ///
    /// Remote rejection (e.g. non-fast-forward) is surfaced as
    /// [`GitError::PushRejected`] via the `push_update_reference` callback.
    #[instrument(skip(self, auth, message))]
    pub fn push(&self, auth: Option<&GitAuth>, message: &str) -> Result<(), GitError> {
        let branch = self.current_branch()?;
        let oid = self.stage_and_commit(message)?;
        info!(branch = branch.as_str(), sha = %oid, "pushing");

        let mut remote = self.repo.find_remote("origin")?;
        let mut callbacks = make_callbacks(auth);

        let push_error = std::sync::Arc::new(std::sync::Mutex::new(None::<String>));
        let push_error_clone = push_error.clone();
        callbacks.push_update_reference(move |refname, status| {
            if let Some(msg) = status {
                warn!(refname, msg, "push rejected");
                *push_error_clone.lock().unwrap() = Some(msg.to_string());
            }
            Ok(())
        });

        let mut push_opts = PushOptions::new();
        push_opts.remote_callbacks(callbacks);
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        remote.push(&[&refspec], Some(&mut push_opts))?;

        if let Some(detail) = push_error.lock().unwrap().take() {
            return Err(GitError::PushRejected { branch, detail });
        }
        info!("push completed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    /// Working-tree status with exclusion patterns filtered out.
    pub fn status(&self) -> Result<VaultStatus, GitError> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .exclude_submodules(true);
        let statuses = self.repo.statuses(Some(&mut opts))?;

        let mut status = VaultStatus::default();
        for entry in statuses.iter() {
            let Some(path) = entry.path() else { continue };
            if self.exclusions.is_excluded(path) {
                continue;
            }
            let flags = entry.status();
            if flags.contains(Status::INDEX_NEW) {
                status.added.push(path.to_string());
            } else if flags.contains(Status::WT_NEW) {
                status.untracked.push(path.to_string());
            } else if flags.intersects(Status::WT_DELETED | Status::INDEX_DELETED) {
                status.removed.push(path.to_string());
            } else if flags.intersects(Status::WT_MODIFIED | Status::INDEX_MODIFIED) {
                status.modified.push(path.to_string());
            }
        }
        status.has_changes = !(status.modified.is_empty()
            && status.added.is_empty()
            && status.removed.is_empty()
            && status.untracked.is_empty());
        Ok(status)
    }

    fn signature(&self) -> Result<Signature<'static>, GitError> {
        Ok(Signature::now(&self.identity.name, &self.identity.email)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> CommitIdentity {
        CommitIdentity {
            name: "Test".into(),
            email: "test@test.com".into(),
        }
    }

    fn init_vault(path: &Path) -> GitClient {
        Repository::init(path).unwrap();
        GitClient::open(path, ExclusionPolicy::allow_all(), identity()).unwrap()
    }

    #[test]
    fn test_open_not_found() {
        let err = GitClient::open("/nonexistent", ExclusionPolicy::allow_all(), identity())
            .unwrap_err();
        assert!(matches!(err, GitError::RepositoryNotFound(_)));
    }

    #[test]
    fn test_clone_existing_path_fails_before_libgit2() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("vault");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("note.md"), "existing content").unwrap();

        // The URL is not even syntactically valid; the precondition must
        // reject the path before any clone attempt could touch it.
        let err = GitClient::clone_vault(
            "definitely not a url",
            &target,
            None,
            None,
            ExclusionPolicy::allow_all(),
            identity(),
        )
        .unwrap_err();
        assert!(matches!(err, GitError::LocalPathExists(_)));
        assert!(target.join("note.md").exists());
    }

    #[test]
    fn test_commit_and_head() {
        let dir = tempfile::tempdir().unwrap();
        let client = init_vault(dir.path());
        std::fs::write(dir.path().join("hello.md"), "hello world").unwrap();

        let oid = client.stage_and_commit("first note").unwrap();
        assert!(!oid.is_zero());
        assert_eq!(client.head_sha().unwrap(), oid.to_string());
    }

    #[test]
    fn test_empty_commit_when_nothing_changed() {
        let dir = tempfile::tempdir().unwrap();
        let client = init_vault(dir.path());
        std::fs::write(dir.path().join("a.md"), "a").unwrap();
        let first = client.stage_and_commit("initial").unwrap();

        // Nothing changed; a second commit is still created.
        let second = client.stage_and_commit("nothing new").unwrap();
        assert_ne!(first, second);
        assert_eq!(client.head_sha().unwrap(), second.to_string());
    }

    #[test]
    fn test_staging_respects_exclusions() {
        let dir = tempfile::tempdir().unwrap();
        Repository::init(dir.path()).unwrap();
        let client = GitClient::open(
            dir.path(),
            ExclusionPolicy::new(vec!["*.tmp".into()]),
            identity(),
        )
        .unwrap();

        std::fs::write(dir.path().join("note.md"), "keep").unwrap();
        std::fs::write(dir.path().join("scratch.tmp"), "skip").unwrap();
        client.stage_and_commit("notes only").unwrap();

        let repo = Repository::open(dir.path()).unwrap();
        let tree = repo.head().unwrap().peel_to_tree().unwrap();
        assert!(tree.get_name("note.md").is_some());
        assert!(tree.get_name("scratch.tmp").is_none());
    }

    #[test]
    fn test_status_filters_exclusions() {
        let dir = tempfile::tempdir().unwrap();
        Repository::init(dir.path()).unwrap();
        let client = GitClient::open(
            dir.path(),
            ExclusionPolicy::new(vec![".trash/**".into()]),
            identity(),
        )
        .unwrap();

        std::fs::write(dir.path().join("todo.md"), "x").unwrap();
        std::fs::create_dir(dir.path().join(".trash")).unwrap();
        std::fs::write(dir.path().join(".trash/old.md"), "y").unwrap();

        let status = client.status().unwrap();
        assert!(status.has_changes);
        assert_eq!(status.untracked, vec!["todo.md".to_string()]);
    }

    #[test]
    fn test_status_after_modify_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let client = init_vault(dir.path());
        std::fs::write(dir.path().join("a.md"), "one").unwrap();
        std::fs::write(dir.path().join("b.md"), "two").unwrap();
        client.stage_and_commit("seed").unwrap();

        std::fs::write(dir.path().join("a.md"), "edited").unwrap();
        std::fs::remove_file(dir.path().join("b.md")).unwrap();

        let status = client.status().unwrap();
        assert_eq!(status.modified, vec!["a.md".to_string()]);
        assert_eq!(status.removed, vec!["b.md".to_string()]);
        assert!(status.has_changes);
    }

    #[test]
    fn test_current_branch_on_unborn_head() {
        let dir = tempfile::tempdir().unwrap();
        let client = init_vault(dir.path());
        // No commit yet; the symbolic HEAD target is still readable.
        let branch = client.current_branch().unwrap();
        assert!(!branch.is_empty());
    }
}
