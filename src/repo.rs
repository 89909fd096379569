//! Repository synchronization and commit bookkeeping.
//!
//! [`WorkingCopy`] is the only type in the crate that touches git2; the
//! orchestrator and aggregator use this API and never see raw git objects.
//!
//! A working copy is synchronized (fetch + hard reset to the remote tip)
//! before each mutation, then mutated and committed. No long-lived lock is
//! held between operations: the publisher assumes single-writer usage, and a
//! concurrent external writer can cause the next sync to discard local work
//! that was never committed.
//!
//! Committing never pushes. Tile sets are large and hosting platforms
//! rate-limit uploads, so [`WorkingCopy::push`] is a separate, independently
//! retryable operation with its own success signal.

use git2::{IndexAddOption, Repository, RepositoryInitOptions, ResetType, Signature};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Fatal local VCS failure.
#[derive(Error, Debug)]
pub enum RepoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
}

/// Remote synchronization failure. Non-fatal to a publish: the pipeline can
/// proceed against the local working copy as a best-effort fallback.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("fetch from origin failed: {0}")]
    Fetch(git2::Error),
    #[error("remote tip not found: {0}")]
    NoRemoteTip(String),
    #[error("hard reset to remote tip failed: {0}")]
    Reset(git2::Error),
    #[error("push to origin failed: {0}")]
    Push(git2::Error),
}

/// What to stage before a commit.
pub enum StageSet {
    /// Stage exactly these paths (relative to the repository root).
    /// Directories are staged recursively.
    Paths(Vec<PathBuf>),
    /// Stage all changes — used for the initial population of a fresh
    /// per-slide repository.
    All,
}

/// Result of a stage-and-commit. Nothing changed is a successful no-op,
/// never an error.
#[derive(Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    NoOp,
    Committed { id: String },
}

/// A local, on-disk mirror of one remote repository.
pub struct WorkingCopy {
    name: String,
    path: PathBuf,
    branch: String,
    repo: Repository,
}

impl WorkingCopy {
    /// Open the working copy under `base/name`, initializing a fresh
    /// repository with an `origin` remote when none exists yet.
    ///
    /// Initialization alone does not talk to the network; call [`sync`] to
    /// fast-forward to the remote tip.
    ///
    /// [`sync`]: WorkingCopy::sync
    pub fn ensure(
        base: &Path,
        name: &str,
        remote_url: &str,
        branch: &str,
    ) -> Result<Self, RepoError> {
        let path = base.join(name);
        let repo = if path.join(".git").exists() {
            Repository::open(&path)?
        } else {
            fs::create_dir_all(&path)?;
            let mut opts = RepositoryInitOptions::new();
            opts.initial_head(&format!("refs/heads/{branch}"));
            let repo = Repository::init_opts(&path, &opts)?;
            info!(name, path = %path.display(), "initialized fresh working copy");
            repo
        };

        if repo.find_remote("origin").is_err() {
            repo.remote("origin", remote_url)?;
            debug!(name, remote_url, "linked origin remote");
        }

        Ok(Self {
            name: name.to_string(),
            path,
            branch: branch.to_string(),
            repo,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Filesystem root of the working copy.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fetch the default branch and hard-reset local state to match the
    /// remote tip exactly, discarding uncommitted local drift.
    pub fn sync(&self) -> Result<(), SyncError> {
        let mut remote = self.repo.find_remote("origin").map_err(SyncError::Fetch)?;
        remote
            .fetch(&[self.branch.as_str()], None, None)
            .map_err(SyncError::Fetch)?;

        let refname = format!("refs/remotes/origin/{}", self.branch);
        let tip = self
            .repo
            .refname_to_id(&refname)
            .map_err(|_| SyncError::NoRemoteTip(refname))?;
        let target = self
            .repo
            .find_object(tip, None)
            .map_err(SyncError::Reset)?;
        self.repo
            .reset(&target, ResetType::Hard, None)
            .map_err(SyncError::Reset)?;

        debug!(name = %self.name, tip = %tip, "synchronized to remote tip");
        Ok(())
    }

    /// Stage the given file set and commit with `message`.
    ///
    /// Stages exactly what it is told — never an implicit "everything"
    /// unless the caller asks with [`StageSet::All`]. A commit that would
    /// change nothing returns [`CommitOutcome::NoOp`].
    pub fn stage_and_commit(
        &self,
        set: &StageSet,
        message: &str,
    ) -> Result<CommitOutcome, RepoError> {
        let mut index = self.repo.index()?;
        let pathspecs: Vec<String> = match set {
            StageSet::Paths(paths) => paths
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
            StageSet::All => vec!["*".to_string()],
        };
        index.add_all(pathspecs.iter(), IndexAddOption::DEFAULT, None)?;
        index.write()?;
        let tree_id = index.write_tree()?;

        let parent = match self.repo.head() {
            Ok(head) => head.peel_to_commit().ok(),
            Err(_) => None, // unborn branch, first commit
        };

        match &parent {
            Some(commit) if commit.tree_id() == tree_id => return Ok(CommitOutcome::NoOp),
            None if index.is_empty() => return Ok(CommitOutcome::NoOp),
            _ => {}
        }

        let tree = self.repo.find_tree(tree_id)?;
        let sig = self.signature()?;
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        let id = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;

        info!(name = %self.name, commit = %id, message, "committed");
        Ok(CommitOutcome::Committed { id: id.to_string() })
    }

    /// Push the default branch to origin. Explicit and separate from
    /// committing; retryable on its own.
    pub fn push(&self) -> Result<(), SyncError> {
        let mut remote = self.repo.find_remote("origin").map_err(SyncError::Push)?;
        let refspec = format!("refs/heads/{b}:refs/heads/{b}", b = self.branch);
        remote.push(&[refspec.as_str()], None).map_err(SyncError::Push)?;
        info!(name = %self.name, branch = %self.branch, "pushed to origin");
        Ok(())
    }

    /// Committer identity: repository/global config if present, a fixed
    /// publisher identity otherwise (CI machines rarely have one).
    fn signature(&self) -> Result<Signature<'static>, git2::Error> {
        self.repo
            .signature()
            .or_else(|_| Signature::now("slidepress", "slidepress@localhost"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scratch_copy(base: &Path, name: &str) -> WorkingCopy {
        WorkingCopy::ensure(base, name, "https://invalid.example/unused.git", "main").unwrap()
    }

    #[test]
    fn ensure_initializes_with_origin() {
        let tmp = TempDir::new().unwrap();
        let wc = scratch_copy(tmp.path(), "gallery-01");

        assert!(wc.path().join(".git").exists());
        assert!(wc.repo.find_remote("origin").is_ok());
    }

    #[test]
    fn ensure_reopens_existing_copy() {
        let tmp = TempDir::new().unwrap();
        {
            let wc = scratch_copy(tmp.path(), "gallery-01");
            fs::write(wc.path().join("a.txt"), "one").unwrap();
            wc.stage_and_commit(&StageSet::All, "init").unwrap();
        }
        let wc = scratch_copy(tmp.path(), "gallery-01");
        assert!(wc.path().join("a.txt").exists());
        assert!(matches!(
            wc.stage_and_commit(&StageSet::All, "again").unwrap(),
            CommitOutcome::NoOp
        ));
    }

    #[test]
    fn commit_stages_exactly_the_given_paths() {
        let tmp = TempDir::new().unwrap();
        let wc = scratch_copy(tmp.path(), "gallery-01");
        fs::write(wc.path().join("staged.txt"), "in").unwrap();
        fs::write(wc.path().join("unstaged.txt"), "out").unwrap();

        let outcome = wc
            .stage_and_commit(
                &StageSet::Paths(vec![PathBuf::from("staged.txt")]),
                "add staged",
            )
            .unwrap();
        assert!(matches!(outcome, CommitOutcome::Committed { .. }));

        let head = wc.repo.head().unwrap().peel_to_tree().unwrap();
        assert!(head.get_name("staged.txt").is_some());
        assert!(head.get_name("unstaged.txt").is_none());
    }

    #[test]
    fn directory_paths_stage_recursively() {
        let tmp = TempDir::new().unwrap();
        let wc = scratch_copy(tmp.path(), "gallery-01");
        let slide_dir = wc.path().join("slides").join("a1b2c3d4");
        fs::create_dir_all(&slide_dir).unwrap();
        fs::write(slide_dir.join("slide.dzi"), "<Image/>").unwrap();

        wc.stage_and_commit(
            &StageSet::Paths(vec![PathBuf::from("slides/a1b2c3d4")]),
            "add slide",
        )
        .unwrap();

        let head = wc.repo.head().unwrap().peel_to_tree().unwrap();
        assert!(head.get_name("slides").is_some());
    }

    #[test]
    fn deleted_files_are_staged_and_committed() {
        let tmp = TempDir::new().unwrap();
        let wc = scratch_copy(tmp.path(), "gallery-01");
        fs::write(wc.path().join("stale.txt"), "old").unwrap();
        wc.stage_and_commit(&StageSet::All, "add").unwrap();

        fs::remove_file(wc.path().join("stale.txt")).unwrap();
        let outcome = wc.stage_and_commit(&StageSet::All, "remove").unwrap();
        assert!(matches!(outcome, CommitOutcome::Committed { .. }));

        let head = wc.repo.head().unwrap().peel_to_tree().unwrap();
        assert!(head.get_name("stale.txt").is_none());
    }

    #[test]
    fn empty_commit_is_a_noop_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let wc = scratch_copy(tmp.path(), "gallery-01");

        // brand-new repo, nothing staged
        assert!(matches!(
            wc.stage_and_commit(&StageSet::All, "nothing").unwrap(),
            CommitOutcome::NoOp
        ));

        // repeated identical commit
        fs::write(wc.path().join("a.txt"), "one").unwrap();
        wc.stage_and_commit(&StageSet::All, "add").unwrap();
        assert!(matches!(
            wc.stage_and_commit(&StageSet::All, "again").unwrap(),
            CommitOutcome::NoOp
        ));
    }

    #[test]
    fn sync_resets_to_remote_tip() {
        let tmp = TempDir::new().unwrap();
        let origin_base = tmp.path().join("origin");
        let local_base = tmp.path().join("local");

        let origin = scratch_copy(&origin_base, "gallery-01");
        fs::write(origin.path().join("index.html"), "<ul></ul>").unwrap();
        origin.stage_and_commit(&StageSet::All, "publish").unwrap();

        let local = WorkingCopy::ensure(
            &local_base,
            "gallery-01",
            origin.path().to_str().unwrap(),
            "main",
        )
        .unwrap();
        local.sync().unwrap();
        assert_eq!(
            fs::read_to_string(local.path().join("index.html")).unwrap(),
            "<ul></ul>"
        );

        // local drift in a tracked file is discarded by the next sync
        fs::write(local.path().join("index.html"), "scribbles").unwrap();
        local.sync().unwrap();
        assert_eq!(
            fs::read_to_string(local.path().join("index.html")).unwrap(),
            "<ul></ul>"
        );
    }

    #[test]
    fn sync_failure_is_reported_not_panicked() {
        let tmp = TempDir::new().unwrap();
        let wc = WorkingCopy::ensure(
            tmp.path(),
            "gallery-01",
            tmp.path().join("no-such-remote").to_str().unwrap(),
            "main",
        )
        .unwrap();

        assert!(matches!(wc.sync(), Err(SyncError::Fetch(_))));
    }

    #[test]
    fn push_publishes_branch_to_origin() {
        let tmp = TempDir::new().unwrap();
        let bare_path = tmp.path().join("origin.git");
        git2::Repository::init_bare(&bare_path).unwrap();

        let wc = WorkingCopy::ensure(
            tmp.path(),
            "gallery-01",
            bare_path.to_str().unwrap(),
            "main",
        )
        .unwrap();
        fs::write(wc.path().join("a.txt"), "one").unwrap();
        wc.stage_and_commit(&StageSet::All, "add").unwrap();

        wc.push().unwrap();

        let bare = git2::Repository::open_bare(&bare_path).unwrap();
        assert!(bare.refname_to_id("refs/heads/main").is_ok());
    }
}
