//! DZI descriptor parsing and pyramid tree validation.
//!
//! A Deep Zoom descriptor is a small XML file:
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?>
//! <Image xmlns="http://schemas.microsoft.com/deepzoom/2008"
//!   Format="jpeg" Overlap="1" TileSize="256">
//!   <Size Height="9221" Width="7026"/>
//! </Image>
//! ```
//!
//! Only the five attributes above matter to the publisher, so they are read
//! by a small explicit scanner rather than an XML library. Level geometry is
//! fully determined by the descriptor: level `N` (the deepest) holds the full
//! resolution, each level above halves the dimensions (rounding up) until
//! 1x1 at level 0.

use super::PyramidError;
use std::path::Path;
use walkdir::WalkDir;

/// Parsed Deep Zoom descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DziDescriptor {
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub overlap: u32,
    pub format: String,
}

impl DziDescriptor {
    /// Parse descriptor XML. Missing or non-numeric attributes are a
    /// [`PyramidError::Descriptor`] — a descriptor that cannot be read means
    /// the pyramid cannot be declared valid.
    pub fn parse(xml: &str) -> Result<Self, PyramidError> {
        let attr = |name: &str| {
            xml_attr(xml, name)
                .ok_or_else(|| PyramidError::Descriptor(format!("missing attribute {name}")))
        };
        let numeric = |name: &str| {
            attr(name)?.parse::<u32>().map_err(|_| {
                PyramidError::Descriptor(format!("attribute {name} is not a number"))
            })
        };

        let descriptor = Self {
            width: numeric("Width")?,
            height: numeric("Height")?,
            tile_size: numeric("TileSize")?,
            overlap: numeric("Overlap")?,
            format: attr("Format")?.to_string(),
        };
        if descriptor.width == 0 || descriptor.height == 0 || descriptor.tile_size == 0 {
            return Err(PyramidError::Descriptor(
                "dimensions and tile size must be non-zero".into(),
            ));
        }
        Ok(descriptor)
    }

    /// The deepest (full-resolution) level index.
    pub fn max_level(&self) -> u32 {
        let mut level = 0;
        let mut dim = self.width.max(self.height);
        while dim > 1 {
            dim = dim.div_ceil(2);
            level += 1;
        }
        level
    }

    /// Pixel dimensions at a given level.
    pub fn level_dimensions(&self, level: u32) -> (u32, u32) {
        let shift = self.max_level() - level;
        (scaled(self.width, shift), scaled(self.height, shift))
    }

    /// Tile grid (columns, rows) at a given level.
    pub fn tile_grid(&self, level: u32) -> (u32, u32) {
        let (w, h) = self.level_dimensions(level);
        (w.div_ceil(self.tile_size), h.div_ceil(self.tile_size))
    }

    /// Expected tile count at a given level.
    pub fn tile_count(&self, level: u32) -> u64 {
        let (cols, rows) = self.tile_grid(level);
        cols as u64 * rows as u64
    }
}

fn scaled(value: u32, shift: u32) -> u32 {
    let mut v = value;
    for _ in 0..shift {
        v = v.div_ceil(2);
    }
    v.max(1)
}

/// Pull a `Name="value"` attribute out of descriptor XML.
fn xml_attr<'a>(xml: &'a str, name: &str) -> Option<&'a str> {
    let marker = format!("{name}=\"");
    let start = xml.find(&marker)? + marker.len();
    let end = xml[start..].find('"')?;
    Some(&xml[start..start + end])
}

/// Verify the tile tree is structurally complete for the descriptor.
///
/// Full-depth pyramids must have every level directory from 0 through the
/// deepest, each holding exactly the tile count the descriptor implies. Flat
/// pyramids have a single level directory holding the full-resolution grid.
/// Anything less means interrupted tiling, which must never be reported as a
/// valid artifact.
pub fn validate_tree(
    tiles_dir: &Path,
    descriptor: &DziDescriptor,
    flat: bool,
) -> Result<(), PyramidError> {
    if !tiles_dir.is_dir() {
        return Err(PyramidError::MissingLevel(tiles_dir.to_path_buf()));
    }
    let deepest = descriptor.max_level();

    if flat {
        // Single level dir; the tool picks its name, so match any one dir.
        let mut dirs: Vec<_> = std::fs::read_dir(tiles_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        let level_dir = match (dirs.len(), dirs.pop()) {
            (1, Some(dir)) => dir,
            _ => return Err(PyramidError::MissingLevel(tiles_dir.join("<single level>"))),
        };
        return check_level(&level_dir, deepest, descriptor.tile_count(deepest));
    }

    for level in 0..=deepest {
        let level_dir = tiles_dir.join(level.to_string());
        if !level_dir.is_dir() {
            return Err(PyramidError::MissingLevel(level_dir));
        }
        check_level(&level_dir, level, descriptor.tile_count(level))?;
    }
    Ok(())
}

fn check_level(level_dir: &Path, level: u32, expected: u64) -> Result<(), PyramidError> {
    let found = WalkDir::new(level_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count() as u64;
    if found != expected {
        return Err(PyramidError::IncompleteLevel {
            level,
            expected,
            found,
        });
    }
    Ok(())
}
