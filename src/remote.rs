//! Hosting platform seam.
//!
//! The publisher needs a handful of platform operations it cannot express
//! through git alone: checking that a repository exists, creating one, and
//! turning on static page hosting. [`RemoteHost`] is the trait boundary for
//! those calls; production wiring supplies a platform client, tests supply
//! [`MockHost`]-style recorders.
//!
//! Single-file writes through the platform API are revision-guarded: a write
//! carries the revision it read, and a mismatch is a [`RemoteError::
//! RevisionConflict`] rather than a silent overwrite.

use std::time::{Duration, Instant};
use thiserror::Error;

/// Opaque revision token for a remote file (a content hash on most
/// platforms). Compared only for equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision(pub String);

/// A file fetched through the platform API.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub content: Vec<u8>,
    pub revision: Revision,
}

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("remote resource not found: {0}")]
    NotFound(String),
    #[error("revision conflict writing {0}; re-read and retry")]
    RevisionConflict(String),
    #[error("remote host unavailable: {0}")]
    Unavailable(String),
}

/// Platform operations the pipeline depends on.
pub trait RemoteHost {
    fn repo_exists(&self, name: &str) -> Result<bool, RemoteError>;

    /// Create a public repository. Creating one that already exists is an
    /// [`RemoteError::Unavailable`] from most platforms; callers check
    /// [`repo_exists`] first.
    ///
    /// [`repo_exists`]: RemoteHost::repo_exists
    fn create_repo(&self, name: &str, description: &str) -> Result<(), RemoteError>;

    /// Enable static page hosting from the given branch root.
    fn enable_pages(&self, name: &str, branch: &str) -> Result<(), RemoteError>;

    fn get_file(&self, repo: &str, path: &str) -> Result<RemoteFile, RemoteError>;

    /// Write a file, guarded by the revision previously read. `None` means
    /// the caller believes the file does not exist yet.
    fn put_file(
        &self,
        repo: &str,
        path: &str,
        content: &[u8],
        revision: Option<&Revision>,
    ) -> Result<Revision, RemoteError>;
}

/// Write `content` to `repo:path`, reading the current revision first so the
/// put is guarded. A missing file is written fresh.
pub fn mirror_file<H: RemoteHost + ?Sized>(
    host: &H,
    repo: &str,
    path: &str,
    content: &[u8],
) -> Result<Revision, RemoteError> {
    match host.get_file(repo, path) {
        Ok(existing) => host.put_file(repo, path, content, Some(&existing.revision)),
        Err(RemoteError::NotFound(_)) => host.put_file(repo, path, content, None),
        Err(other) => Err(other),
    }
}

/// Minimum-interval pacing for platform API calls. Platforms throttle rapid
/// content writes, so callers wait through the gate before each one.
pub struct RateGate {
    min_interval: Duration,
    last: Option<Instant>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    /// Block until at least the configured interval has passed since the
    /// previous call, then record this one.
    pub fn wait(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                std::thread::sleep(self.min_interval - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}
