//! Publisher configuration.
//!
//! Handles loading and validating `slidepress.toml`. Configuration is an
//! explicit value passed into each component at construction — there is no
//! module-level environment state, and the process entry point owns the
//! lifecycle.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! user = "example"          # Hosting account; drives page and remote URLs
//! gallery_repo = "galeri"   # Top-level gallery repository name
//! repo_base = "repos"       # Directory holding local working copies
//! upload_dir = "uploads"    # Staging area for freshly tiled pyramids
//! branch = "main"           # Default branch synchronized and committed to
//!
//! [tiling]
//! tile_size = 256           # Square tile edge in pixels
//! overlap = 1               # Tile overlap in pixels
//! quality = 80              # JPEG quality for tiles (1-100)
//! flat = false              # true = single-level pyramid (depth "one")
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse — override just the values you want. Unknown keys
//! are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Publisher configuration loaded from `slidepress.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishConfig {
    /// Hosting account name; drives page URLs and remote URLs.
    pub user: String,
    /// Name of the top-level gallery repository.
    pub gallery_repo: String,
    /// Directory holding local working copies of all repositories.
    pub repo_base: PathBuf,
    /// Staging area where pyramids are tiled before repository placement.
    pub upload_dir: PathBuf,
    /// Default branch synchronized and committed to.
    pub branch: String,
    /// Tiling policy passed to the pyramid backend.
    pub tiling: TilingConfig,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            user: "example".to_string(),
            gallery_repo: "galeri".to_string(),
            repo_base: PathBuf::from("repos"),
            upload_dir: PathBuf::from("uploads"),
            branch: "main".to_string(),
            tiling: TilingConfig::default(),
        }
    }
}

impl PublishConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.user.is_empty() {
            return Err(ConfigError::Validation("user must not be empty".into()));
        }
        if self.gallery_repo.is_empty() {
            return Err(ConfigError::Validation(
                "gallery_repo must not be empty".into(),
            ));
        }
        if self.branch.is_empty() {
            return Err(ConfigError::Validation("branch must not be empty".into()));
        }
        self.tiling.validate()
    }

    /// Public static-hosting URL for a repository, with trailing slash.
    pub fn pages_url(&self, repo: &str) -> String {
        format!("https://{}.github.io/{}/", self.user, repo)
    }

    /// Public viewer URL for one slide within a repository.
    pub fn slide_url(&self, repo: &str, slide_id: &str) -> String {
        format!("{}slides/{}/", self.pages_url(repo), slide_id)
    }

    /// Remote URL used when linking a fresh working copy to its origin.
    pub fn remote_url(&self, repo: &str) -> String {
        format!("https://github.com/{}/{}.git", self.user, repo)
    }
}

/// Fixed tiling policy for the external pyramid tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TilingConfig {
    /// Square tile edge in pixels.
    pub tile_size: u32,
    /// Tile overlap in pixels.
    pub overlap: u32,
    /// JPEG quality for tiles (1-100).
    pub quality: u32,
    /// When true, produce a single-level pyramid instead of the full depth.
    pub flat: bool,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            tile_size: 256,
            overlap: 1,
            quality: 80,
            flat: false,
        }
    }
}

impl TilingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_size == 0 {
            return Err(ConfigError::Validation(
                "tiling.tile_size must be non-zero".into(),
            ));
        }
        if self.quality == 0 || self.quality > 100 {
            return Err(ConfigError::Validation(
                "tiling.quality must be 1-100".into(),
            ));
        }
        if self.overlap >= self.tile_size {
            return Err(ConfigError::Validation(
                "tiling.overlap must be smaller than tile_size".into(),
            ));
        }
        Ok(())
    }
}

/// Load config from `slidepress.toml` in the given directory.
///
/// Falls back to stock defaults when the file does not exist, rejects
/// unknown keys, and validates the result.
pub fn load_config(dir: &Path) -> Result<PublishConfig, ConfigError> {
    let path = dir.join("slidepress.toml");
    let config = if path.exists() {
        let content = fs::read_to_string(&path)?;
        toml::from_str(&content)?
    } else {
        PublishConfig::default()
    };
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `slidepress.toml` with all keys explained.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r#"# slidepress configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Hosting account name; drives page URLs (https://<user>.github.io/<repo>/)
# and remote URLs (https://github.com/<user>/<repo>.git).
user = "example"

# Top-level gallery repository holding the combined index.
gallery_repo = "galeri"

# Directory holding local working copies of all repositories.
repo_base = "repos"

# Staging area where pyramids are tiled before repository placement.
upload_dir = "uploads"

# Default branch synchronized and committed to.
branch = "main"

# ---------------------------------------------------------------------------
# Tiling policy for the external pyramid tool
# ---------------------------------------------------------------------------
[tiling]
# Square tile edge in pixels.
tile_size = 256

# Tile overlap in pixels.
overlap = 1

# JPEG quality for tiles (1-100).
quality = 80

# true = single-level pyramid (only the full-resolution level).
flat = false
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_when_no_toml() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();

        assert_eq!(config.gallery_repo, "galeri");
        assert_eq!(config.tiling.tile_size, 256);
        assert!(!config.tiling.flat);
    }

    #[test]
    fn sparse_override() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("slidepress.toml"),
            "user = \"pathlab\"\n[tiling]\nquality = 90\n",
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.user, "pathlab");
        assert_eq!(config.tiling.quality, 90);
        // untouched defaults survive
        assert_eq!(config.tiling.tile_size, 256);
        assert_eq!(config.branch, "main");
    }

    #[test]
    fn unknown_key_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("slidepress.toml"), "userr = \"oops\"\n").unwrap();

        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn quality_out_of_range_rejected() {
        let config = PublishConfig {
            tiling: TilingConfig {
                quality: 101,
                ..TilingConfig::default()
            },
            ..PublishConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let parsed: PublishConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(parsed.gallery_repo, PublishConfig::default().gallery_repo);
        assert_eq!(parsed.tiling.tile_size, 256);
    }

    #[test]
    fn url_helpers() {
        let config = PublishConfig {
            user: "pathlab".into(),
            ..PublishConfig::default()
        };
        assert_eq!(
            config.pages_url("gallery-01"),
            "https://pathlab.github.io/gallery-01/"
        );
        assert_eq!(
            config.slide_url("gallery-01", "a1b2c3d4"),
            "https://pathlab.github.io/gallery-01/slides/a1b2c3d4/"
        );
        assert_eq!(
            config.remote_url("galeri"),
            "https://github.com/pathlab/galeri.git"
        );
    }
}
