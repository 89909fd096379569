//! # slidepress
//!
//! Publishes whole-slide images as interactive, deep-zoomable galleries on
//! plain static hosting. A scanned slide goes in; a tile pyramid, a viewer
//! page, and updated gallery indexes come out, committed to version-controlled
//! repositories that double as the hosting source.
//!
//! # Architecture: One Pipeline, Two Repositories
//!
//! Each publish drives a single slide through a fixed stage sequence:
//!
//! ```text
//! received -> tiling -> staging files -> merging manifest
//!          -> committing slide repository -> committing gallery repository
//! ```
//!
//! Slides live in per-slide repositories (hosting platforms cap repository
//! size, and a pyramid is tens of thousands of tiles); a top-level gallery
//! repository holds the combined index. Both carry the same three renderings
//! of the manifest: `index.html` for browsers, `README.md` for the repository
//! front page, and `gallery.json` as the structured record the aggregator
//! rebuilds everything else from.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pyramid`] | Tiling via external `vips dzsave`, descriptor parsing, all-or-nothing tree validation |
//! | [`manifest`] | Manifest parse/merge/render: HTML fragment, Markdown, viewer page |
//! | [`repo`] | Working copy sync, staged commits, explicit push |
//! | [`publish`] | The pipeline orchestrator and its step log |
//! | [`aggregate`] | Cross-repository rebuild of the top-level gallery |
//! | [`remote`] | Hosting platform seam: repo creation, page hosting, guarded file writes |
//! | [`config`] | `slidepress.toml` loading, validation, URL derivation |
//! | [`types`] | The shared [`types::GalleryEntry`] value and its `gallery.json` record |
//! | [`output`] | CLI output formatting for publish and rebuild reports |
//!
//! # Design Decisions
//!
//! ## Commit Locally, Push Explicitly
//!
//! Publishing ends at a local commit. Pushing tens of thousands of tiles is
//! slow, rate-limited, and fails in ways that should never corrupt the
//! pipeline's own bookkeeping, so `push` is a separate command the operator
//! runs (and re-runs) when ready.
//!
//! ## All-or-Nothing Pyramids
//!
//! The tiling tool can die mid-write and still leave a plausible-looking
//! directory. [`pyramid::generate`] only hands back an artifact after
//! verifying the descriptor and counting every tile of every level against
//! the descriptor geometry. A truncated pyramid is an error, never a publish.
//!
//! ## An Explicit Parser Over Regex Scraping
//!
//! The gallery page is partially hand-edited by its owners. The manifest
//! parser locates the list by its `<ul>` boundaries and reads fixed child
//! tags, dropping items that do not match instead of failing the run. The
//! structured `gallery.json` record, not the HTML, is what aggregation
//! trusts; the HTML is one rendering of it.
//!
//! ## Maud Over Template Engines
//!
//! Generated HTML (index pages, viewer pages) comes from
//! [Maud](https://maud.lambda.xyz/) compile-time templates: malformed markup
//! is a build error, interpolation is type-checked, and escaping is automatic.
//! Determinism matters here, since every rendering is committed and spurious
//! diffs would turn each publish into a noisy commit.

pub mod aggregate;
pub mod config;
pub mod manifest;
pub mod output;
pub mod publish;
pub mod pyramid;
pub mod remote;
pub mod repo;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
