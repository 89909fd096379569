//! Tiling backend trait and the libvips implementation.
//!
//! The [`TileBackend`] trait is the seam between the publisher and the
//! external pyramid generator, so pipeline logic can be exercised against a
//! mock without tiling gigapixel images.
//!
//! The production backend shells out to `vips dzsave`, which handles every
//! slide format libvips was built with (SVS, generic TIFF, JPEG, ...). The
//! tool runs for minutes on large slides and is allowed to run to completion
//! or failure — no timeout applies to local tiling.

use super::{Progress, PyramidError};
use crate::config::TilingConfig;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Basename for tiling output within the destination directory; yields
/// `slide.dzi` plus `slide_files/`.
pub const OUTPUT_BASENAME: &str = "slide";

/// Seam over the external tiling tool.
pub trait TileBackend {
    /// Run the tiler, producing a descriptor and tile tree under `dest_dir`.
    ///
    /// Implementations report coarse progress through `progress`; the caller
    /// validates the resulting tree, so a backend that exits successfully but
    /// writes a truncated pyramid is still caught.
    fn tile(
        &self,
        source: &Path,
        dest_dir: &Path,
        params: &TilingConfig,
        progress: &mut Progress<'_>,
    ) -> Result<(), PyramidError>;
}

/// Production backend invoking `vips dzsave`.
pub struct VipsBackend;

impl TileBackend for VipsBackend {
    fn tile(
        &self,
        source: &Path,
        dest_dir: &Path,
        params: &TilingConfig,
        progress: &mut Progress<'_>,
    ) -> Result<(), PyramidError> {
        progress.report(10, "opening source image");

        let base = dest_dir.join(OUTPUT_BASENAME);
        let suffix = format!(".jpeg[Q={}]", params.quality);
        let depth = if params.flat { "one" } else { "onepixel" };

        progress.report(20, "generating pyramid tiles (large slides take minutes)");
        debug!(source = %source.display(), dest = %base.display(), depth, "invoking vips dzsave");

        let output = Command::new("vips")
            .arg("dzsave")
            .arg(source)
            .arg(&base)
            .arg("--layout")
            .arg("dz")
            .arg("--suffix")
            .arg(&suffix)
            .arg("--overlap")
            .arg(params.overlap.to_string())
            .arg("--tile-size")
            .arg(params.tile_size.to_string())
            .arg("--depth")
            .arg(depth)
            .output()?;

        if !output.status.success() {
            return Err(PyramidError::Tool {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
