//! Cross-repository aggregation.
//!
//! Walks every per-slide repository under the working-copy base, reads each
//! structured `gallery.json` record, and rebuilds the top-level gallery from
//! scratch: newest first, each entry tagged with its source repository.
//!
//! A repository with a missing or unreadable record is skipped with a
//! warning, never a fatal error. One mangled record must not take the whole
//! gallery down; the skip list comes back to the caller for reporting.

use crate::manifest;
use crate::types::{self, GalleryEntry, RECORD_FILENAME};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Record error: {0}")]
    Record(#[from] types::RecordError),
}

/// Everything a rebuild produced.
#[derive(Debug)]
pub struct AggregateResult {
    /// Merged entries, newest first, tagged with their source repository.
    pub entries: Vec<GalleryEntry>,
    /// Repositories skipped because their record was unreadable.
    pub skipped: Vec<String>,
    /// Files rewritten in the gallery working copy, relative to its root.
    pub written: Vec<PathBuf>,
}

/// List per-slide repositories under `base`: directories carrying a
/// `gallery.json` record, excluding the top-level gallery itself.
/// Lexically sorted so discovery order never depends on the filesystem.
pub fn discover_repos(base: &Path, exclude: &str) -> Result<Vec<String>, AggregateError> {
    let mut names = Vec::new();
    if !base.is_dir() {
        return Ok(names);
    }
    for entry in fs::read_dir(base)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if path.is_dir() && name != exclude && path.join(RECORD_FILENAME).is_file() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Read and tag the records of the given repositories.
///
/// Unreadable records are collected into the skip list; readable entries are
/// returned sorted for the rebuilt gallery.
pub fn collect(base: &Path, repos: &[String]) -> (Vec<GalleryEntry>, Vec<String>) {
    let mut entries = Vec::new();
    let mut skipped = Vec::new();

    for repo in repos {
        let record_path = base.join(repo).join(RECORD_FILENAME);
        match types::load_records(&record_path) {
            Ok(records) => {
                debug!(repo, count = records.len(), "collected records");
                for mut record in records {
                    record.repo = Some(repo.clone());
                    entries.push(record);
                }
            }
            Err(err) => {
                warn!(repo, error = %err, "skipping repository with unreadable record");
                skipped.push(repo.clone());
            }
        }
    }

    manifest::sort_for_rebuild(&mut entries);
    (entries, skipped)
}

/// Rebuild the top-level gallery working copy from all discovered
/// repositories under `base`.
pub fn rebuild(base: &Path, gallery_repo: &str) -> Result<AggregateResult, AggregateError> {
    let repos = discover_repos(base, gallery_repo)?;
    let (entries, skipped) = collect(base, &repos);
    let written = rebuild_into(&base.join(gallery_repo), &entries)?;
    Ok(AggregateResult {
        entries,
        skipped,
        written,
    })
}

/// Write the rebuilt record, index page, and README into the gallery working
/// copy. The index splices into an existing page template when one is there.
pub fn rebuild_into(
    gallery_root: &Path,
    entries: &[GalleryEntry],
) -> Result<Vec<PathBuf>, AggregateError> {
    fs::create_dir_all(gallery_root)?;

    types::save_records(&gallery_root.join(RECORD_FILENAME), entries)?;

    let index_path = gallery_root.join("index.html");
    let existing = fs::read_to_string(&index_path).ok();
    fs::write(&index_path, manifest::render_page(entries, existing.as_deref()))?;

    fs::write(
        gallery_root.join("README.md"),
        manifest::render_markdown(entries),
    )?;

    Ok(vec![
        PathBuf::from(RECORD_FILENAME),
        PathBuf::from("index.html"),
        PathBuf::from("README.md"),
    ])
}
