//! Shared types for the publishing pipeline.
//!
//! A [`GalleryEntry`] is a value, not a reference: it is fully reconstructed
//! from the on-disk HTML or JSON on every read. The JSON form (`gallery.json`,
//! one array of entries per repository) is the authoritative structured record
//! that the aggregator rebuilds the top-level manifest from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One published slide reference.
///
/// Entries are deduplicated by `id` — the repository-scoped slide UID, never
/// the title (titles collide on renames and duplicates). An entry is created
/// when a slide is first published, replaced in place on re-publish, and never
/// implicitly deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryEntry {
    /// Stable dedup key, unique within a manifest.
    pub id: String,
    /// Display text for the gallery listing.
    pub title: String,
    /// Free text, possibly multi-line.
    #[serde(default)]
    pub description: String,
    /// Public viewer link.
    pub page_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Orders aggregate views newest-first.
    pub published_at: DateTime<Utc>,
    /// Source repository tag, set by the aggregator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

/// Filename of the structured record within a repository working copy.
pub const RECORD_FILENAME: &str = "gallery.json";

/// Load the `gallery.json` record from a repository working copy.
///
/// A missing file is the empty case, not an error — a brand-new repository
/// has no record yet.
pub fn load_records(path: &Path) -> Result<Vec<GalleryEntry>, RecordError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Write the `gallery.json` record, pretty-printed with a trailing newline
/// so hand edits and generated output diff cleanly.
pub fn save_records(path: &Path, entries: &[GalleryEntry]) -> Result<(), RecordError> {
    let mut json = serde_json::to_string_pretty(entries)?;
    json.push('\n');
    fs::write(path, json)?;
    Ok(())
}
