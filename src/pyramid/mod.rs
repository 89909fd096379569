//! Tile pyramid adapter.
//!
//! Wraps the external tiling tool behind the [`TileBackend`] seam and
//! enforces the all-or-nothing contract: [`generate`] never returns a
//! [`PyramidArtifact`] for a tree it has not fully verified (descriptor
//! parses, every expected level directory exists, tile counts match the
//! descriptor geometry). Interrupted tiling output is reported as an error;
//! the caller decides whether to delete or retry.
//!
//! Tiling is long-running, so callers get progress through a callback with a
//! monotonically non-decreasing percentage and a phase label. The callback
//! can never break the conversion — a panicking callback is caught, logged,
//! and ignored.

pub mod backend;
pub mod descriptor;

pub use backend::{TileBackend, VipsBackend, OUTPUT_BASENAME};
pub use descriptor::DziDescriptor;

use crate::config::TilingConfig;
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum PyramidError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Source image not found: {0}")]
    SourceNotFound(PathBuf),
    #[error("Tiling tool failed (exit {status}): {stderr}")]
    Tool { status: i32, stderr: String },
    #[error("Pyramid descriptor missing: {0}")]
    MissingDescriptor(PathBuf),
    #[error("Invalid pyramid descriptor: {0}")]
    Descriptor(String),
    #[error("Pyramid level directory missing: {0}")]
    MissingLevel(PathBuf),
    #[error("Incomplete pyramid level {level}: expected {expected} tiles, found {found}")]
    IncompleteLevel { level: u32, expected: u64, found: u64 },
}

/// A verified tiling output: descriptor file plus tile directory tree.
#[derive(Debug)]
pub struct PyramidArtifact {
    pub descriptor_path: PathBuf,
    pub tiles_dir: PathBuf,
    pub descriptor: DziDescriptor,
}

/// Progress reporter handed to backends.
///
/// Percentages are clamped to be non-decreasing, and callback panics are
/// swallowed so reporting can never affect conversion correctness.
pub struct Progress<'a> {
    last: u8,
    callback: &'a mut dyn FnMut(u8, &str),
}

impl<'a> Progress<'a> {
    pub fn new(callback: &'a mut dyn FnMut(u8, &str)) -> Self {
        Self { last: 0, callback }
    }

    pub fn report(&mut self, percent: u8, phase: &str) {
        let percent = percent.max(self.last).min(100);
        self.last = percent;
        let callback = &mut self.callback;
        if catch_unwind(AssertUnwindSafe(|| callback(percent, phase))).is_err() {
            warn!(percent, phase, "progress callback panicked; continuing");
        }
    }
}

/// Run the tiler and verify its output.
///
/// On success the destination directory holds `slide.dzi` plus
/// `slide_files/`; on any failure no artifact is returned and the caller owns
/// the (possibly partial) directory.
pub fn generate(
    backend: &dyn TileBackend,
    source: &Path,
    dest_dir: &Path,
    params: &TilingConfig,
    on_progress: &mut dyn FnMut(u8, &str),
) -> Result<PyramidArtifact, PyramidError> {
    if !source.is_file() {
        return Err(PyramidError::SourceNotFound(source.to_path_buf()));
    }
    fs::create_dir_all(dest_dir)?;

    let mut progress = Progress::new(on_progress);
    backend.tile(source, dest_dir, params, &mut progress)?;

    progress.report(90, "validating pyramid");
    let descriptor_path = dest_dir.join(format!("{OUTPUT_BASENAME}.dzi"));
    if !descriptor_path.is_file() {
        return Err(PyramidError::MissingDescriptor(descriptor_path));
    }
    let descriptor = DziDescriptor::parse(&fs::read_to_string(&descriptor_path)?)?;
    let tiles_dir = dest_dir.join(format!("{OUTPUT_BASENAME}_files"));
    descriptor::validate_tree(&tiles_dir, &descriptor, params.flat)?;

    progress.report(100, "pyramid complete");
    Ok(PyramidArtifact {
        descriptor_path,
        tiles_dir,
        descriptor,
    })
}
