//! Shared test utilities for the slidepress test suite.
//!
//! Provides deterministic gallery entry fixtures, fake pyramid trees on disk,
//! and a scriptable tiling backend so pipeline tests never shell out to vips.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let entries = vec![sample_entry("a1b2c3d4", 0), sample_entry_with_thumb("e5f6", 30)];
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let descriptor = write_fake_pyramid(tmp.path(), 512, 512, false);
//! assert_eq!(descriptor.max_level(), 9);
//! ```

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::fs;
use std::path::Path;

use crate::config::TilingConfig;
use crate::pyramid::descriptor::DziDescriptor;
use crate::pyramid::{Progress, PyramidError, TileBackend, OUTPUT_BASENAME};
use crate::types::GalleryEntry;

// =========================================================================
// Gallery entry fixtures
// =========================================================================

/// Fixed reference instant for fixture timestamps. Whole seconds only, so
/// entries survive the second-precision HTML rendering unchanged.
fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// A deterministic entry published `offset_minutes` after the fixture epoch.
pub fn sample_entry(id: &str, offset_minutes: i64) -> GalleryEntry {
    GalleryEntry {
        id: id.to_string(),
        title: format!("Lung Biopsy {id}"),
        description: "H&E stained section, 40x scan".to_string(),
        page_url: format!("https://example.github.io/gallery-01/slides/{id}/"),
        thumbnail_url: None,
        published_at: base_time() + Duration::minutes(offset_minutes),
        repo: None,
    }
}

/// Like [`sample_entry`] but with a thumbnail URL set.
pub fn sample_entry_with_thumb(id: &str, offset_minutes: i64) -> GalleryEntry {
    let mut entry = sample_entry(id, offset_minutes);
    entry.thumbnail_url = Some(format!(
        "https://example.github.io/gallery-01/slides/{id}/thumbnail.jpg"
    ));
    entry
}

// =========================================================================
// Fake pyramid trees
// =========================================================================

/// Write a structurally complete fake pyramid under `dest`: `slide.dzi` plus
/// `slide_files/` with zero-byte tiles in every expected position. Returns
/// the descriptor the tree satisfies.
pub fn write_fake_pyramid(dest: &Path, width: u32, height: u32, flat: bool) -> DziDescriptor {
    let descriptor = DziDescriptor {
        width,
        height,
        tile_size: 256,
        overlap: 1,
        format: "jpeg".to_string(),
    };

    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <Image xmlns=\"http://schemas.microsoft.com/deepzoom/2008\"\n  \
         Format=\"jpeg\" Overlap=\"1\" TileSize=\"256\">\n  \
         <Size Height=\"{height}\" Width=\"{width}\"/>\n\
         </Image>\n"
    );
    fs::create_dir_all(dest).unwrap();
    fs::write(dest.join(format!("{OUTPUT_BASENAME}.dzi")), xml).unwrap();

    let tiles_dir = dest.join(format!("{OUTPUT_BASENAME}_files"));
    let deepest = descriptor.max_level();
    let levels: Vec<u32> = if flat {
        vec![deepest]
    } else {
        (0..=deepest).collect()
    };
    for level in levels {
        let level_dir = tiles_dir.join(level.to_string());
        fs::create_dir_all(&level_dir).unwrap();
        let (cols, rows) = descriptor.tile_grid(level);
        for col in 0..cols {
            for row in 0..rows {
                fs::write(level_dir.join(format!("{col}_{row}.jpeg")), []).unwrap();
            }
        }
    }
    descriptor
}

// =========================================================================
// Scriptable tiling backend
// =========================================================================

/// How [`FakeTiler`] misbehaves, if at all.
pub enum FakeTilerMode {
    /// Write a complete, valid pyramid.
    Complete,
    /// Exit successfully but leave the deepest level one tile short,
    /// simulating a tool killed mid-write.
    TruncatedLevel,
    /// Exit successfully without writing a descriptor at all.
    NoDescriptor,
}

/// Tiling backend that fabricates pyramid trees instead of invoking vips.
pub struct FakeTiler {
    width: u32,
    height: u32,
    mode: FakeTilerMode,
}

impl FakeTiler {
    pub fn new(width: u32, height: u32, mode: FakeTilerMode) -> Self {
        Self {
            width,
            height,
            mode,
        }
    }
}

impl TileBackend for FakeTiler {
    fn tile(
        &self,
        _source: &Path,
        dest_dir: &Path,
        params: &TilingConfig,
        progress: &mut Progress<'_>,
    ) -> Result<(), PyramidError> {
        progress.report(20, "generating pyramid tiles");
        let descriptor = write_fake_pyramid(dest_dir, self.width, self.height, params.flat);

        match self.mode {
            FakeTilerMode::Complete => {}
            FakeTilerMode::TruncatedLevel => {
                let deepest = descriptor.max_level();
                let (cols, rows) = descriptor.tile_grid(deepest);
                let victim = dest_dir
                    .join(format!("{OUTPUT_BASENAME}_files"))
                    .join(deepest.to_string())
                    .join(format!("{}_{}.jpeg", cols - 1, rows - 1));
                fs::remove_file(victim)?;
            }
            FakeTilerMode::NoDescriptor => {
                fs::remove_file(dest_dir.join(format!("{OUTPUT_BASENAME}.dzi")))?;
            }
        }
        progress.report(80, "pyramid tiles written");
        Ok(())
    }
}
