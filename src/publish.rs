//! Publish pipeline orchestration.
//!
//! Drives one slide from source image to committed gallery state:
//!
//! ```text
//! received -> tiling -> staging files -> merging manifest
//!          -> committing slide repository -> committing gallery repository
//! ```
//!
//! Every run produces a [`PublishResult`] carrying the full step log,
//! whether the run failed at stage three or sailed through. A failed stage
//! stops the pipeline; a degraded stage (remote sync unreachable) is recorded
//! and the run continues against the local working copies.
//!
//! Re-publishing the same slide id with identical inputs converges: the
//! staged bytes match what is already committed and both commits come back
//! as no-ops.

use crate::config::PublishConfig;
use crate::manifest;
use crate::pyramid::{self, TileBackend};
use crate::repo::{CommitOutcome, StageSet, WorkingCopy};
use crate::types::{self, GalleryEntry, RECORD_FILENAME};
use chrono::{DateTime, Utc};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

/// What the caller wants published.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Source image handed to the tiling tool.
    pub source_image: PathBuf,
    pub title: String,
    pub description: String,
    /// Optional preview image copied alongside the pyramid.
    pub thumbnail: Option<PathBuf>,
    /// Per-slide repository the pyramid lands in.
    pub repo: String,
    /// Explicit slide id; omitted means a fresh one is generated.
    pub slide_id: Option<String>,
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Tiling,
    StagingFiles,
    MergingManifest,
    CommittingSlideRepo,
    CommittingGalleryRepo,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Received => "received",
            Stage::Tiling => "tiling",
            Stage::StagingFiles => "staging files",
            Stage::MergingManifest => "merging manifest",
            Stage::CommittingSlideRepo => "committing slide repository",
            Stage::CommittingGalleryRepo => "committing gallery repository",
            Stage::Done => "done",
        };
        f.write_str(label)
    }
}

/// How one stage went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Ok,
    /// Completed with something worth surfacing (a no-op commit, a cleanup).
    Info(String),
    /// Completed in a reduced mode; the run continues.
    Degraded(String),
    /// Stopped the pipeline.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct StepRecord {
    pub stage: Stage,
    pub outcome: StepOutcome,
}

/// The stage and reason a run stopped at.
#[derive(Debug, Clone)]
pub struct Failure {
    pub stage: Stage,
    pub reason: String,
}

/// Full account of one publish run. Always returned, success or not.
#[derive(Debug)]
pub struct PublishResult {
    pub steps: Vec<StepRecord>,
    pub success: bool,
    pub failure: Option<Failure>,
    /// Merged gallery manifest after the run (empty on early failure).
    pub manifest: Vec<GalleryEntry>,
    /// Slide id the run published under, once one was assigned.
    pub slide_id: Option<String>,
}

/// Step log under construction.
struct StepLog {
    steps: Vec<StepRecord>,
}

impl StepLog {
    fn new() -> Self {
        Self { steps: Vec::new() }
    }

    fn record(&mut self, stage: Stage, outcome: StepOutcome) {
        match &outcome {
            StepOutcome::Ok => info!(stage = %stage, "stage complete"),
            StepOutcome::Info(note) => info!(stage = %stage, note, "stage complete"),
            StepOutcome::Degraded(reason) => warn!(stage = %stage, reason, "stage degraded"),
            StepOutcome::Failed(reason) => warn!(stage = %stage, reason, "stage failed"),
        }
        self.steps.push(StepRecord { stage, outcome });
    }

    fn fail(self, stage: Stage, reason: String, slide_id: Option<String>) -> PublishResult {
        let mut log = self;
        log.record(stage, StepOutcome::Failed(reason.clone()));
        PublishResult {
            steps: log.steps,
            success: false,
            failure: Some(Failure { stage, reason }),
            manifest: Vec::new(),
            slide_id,
        }
    }
}

/// Run the whole pipeline for one slide.
///
/// `on_progress` receives coarse percentages across all stages; tiling
/// dominates the scale since it dominates the wall clock.
pub fn publish(
    config: &PublishConfig,
    backend: &dyn TileBackend,
    request: &PublishRequest,
    on_progress: &mut dyn FnMut(u8, &str),
) -> PublishResult {
    let mut log = StepLog::new();
    let mut progress = pyramid::Progress::new(on_progress);

    // -- received ------------------------------------------------------------
    if request.title.trim().is_empty() {
        return log.fail(Stage::Received, "title must not be empty".into(), None);
    }
    if request.repo.trim().is_empty() {
        return log.fail(
            Stage::Received,
            "target repository must not be empty".into(),
            None,
        );
    }
    log.record(Stage::Received, StepOutcome::Ok);

    let slide_id = request
        .slide_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string()[..8].to_string());

    // -- tiling --------------------------------------------------------------
    progress.report(2, "tiling");
    let staging = config.upload_dir.join(format!("out-{slide_id}"));
    let tiled = pyramid::generate(
        backend,
        &request.source_image,
        &staging,
        &config.tiling,
        &mut |pct, phase| progress.report(2 + (pct as u16 * 58 / 100) as u8, phase),
    );
    if let Err(err) = tiled {
        // leave no partial pyramid behind for a later run to trip over
        if staging.exists() {
            if let Err(clean_err) = fs::remove_dir_all(&staging) {
                warn!(error = %clean_err, "failed to clean up partial tiling output");
            } else {
                log.record(
                    Stage::Tiling,
                    StepOutcome::Info("removed partial tiling output".into()),
                );
            }
        }
        return log.fail(Stage::Tiling, err.to_string(), Some(slide_id));
    }
    if let Err(err) = fs::write(
        staging.join("index.html"),
        manifest::render_viewer(&request.title),
    ) {
        return log.fail(Stage::Tiling, err.to_string(), Some(slide_id));
    }
    log.record(Stage::Tiling, StepOutcome::Ok);

    // -- staging files -------------------------------------------------------
    progress.report(65, "staging files");
    let slide_wc = match WorkingCopy::ensure(
        &config.repo_base,
        &request.repo,
        &config.remote_url(&request.repo),
        &config.branch,
    ) {
        Ok(wc) => wc,
        Err(err) => return log.fail(Stage::StagingFiles, err.to_string(), Some(slide_id)),
    };
    let slide_sync = sync_outcome(&slide_wc);

    let slide_dir = slide_wc.path().join("slides").join(&slide_id);
    let staged = stage_slide_files(&staging, &slide_dir, request.thumbnail.as_deref());
    if let Err(err) = staged {
        return log.fail(Stage::StagingFiles, err.to_string(), Some(slide_id));
    }
    if let Err(err) = fs::remove_dir_all(&staging) {
        warn!(error = %err, "failed to remove staging directory after placement");
    }
    log.record(Stage::StagingFiles, slide_sync);

    // -- merging manifest ----------------------------------------------------
    progress.report(75, "merging manifest");
    let record_path = slide_wc.path().join(RECORD_FILENAME);
    let existing = match types::load_records(&record_path) {
        Ok(entries) => entries,
        Err(err) => return log.fail(Stage::MergingManifest, err.to_string(), Some(slide_id)),
    };

    let entry = build_entry(config, request, &slide_id, &existing);
    if let Err(err) = fs::write(
        slide_dir.join("README.md"),
        manifest::render_slide_readme(&entry),
    ) {
        return log.fail(Stage::MergingManifest, err.to_string(), Some(slide_id));
    }

    let merged = manifest::upsert(existing, entry.clone());
    if let Err(err) = types::save_records(&record_path, &merged) {
        return log.fail(Stage::MergingManifest, err.to_string(), Some(slide_id));
    }
    if let Err(err) = write_index(slide_wc.path(), &merged) {
        return log.fail(Stage::MergingManifest, err.to_string(), Some(slide_id));
    }
    log.record(Stage::MergingManifest, StepOutcome::Ok);

    // -- committing slide repository -----------------------------------------
    progress.report(85, "committing slide repository");
    let paths = StageSet::Paths(vec![
        PathBuf::from("slides").join(&slide_id),
        PathBuf::from(RECORD_FILENAME),
        PathBuf::from("index.html"),
    ]);
    match slide_wc.stage_and_commit(&paths, &format!("Publish slide {slide_id}")) {
        Ok(outcome) => log.record(Stage::CommittingSlideRepo, commit_note(outcome)),
        Err(err) => {
            return log.fail(Stage::CommittingSlideRepo, err.to_string(), Some(slide_id))
        }
    }

    // -- committing gallery repository ---------------------------------------
    progress.report(92, "committing gallery repository");
    let gallery_wc = match WorkingCopy::ensure(
        &config.repo_base,
        &config.gallery_repo,
        &config.remote_url(&config.gallery_repo),
        &config.branch,
    ) {
        Ok(wc) => wc,
        Err(err) => {
            return log.fail(Stage::CommittingGalleryRepo, err.to_string(), Some(slide_id))
        }
    };
    let gallery_sync = sync_outcome(&gallery_wc);
    if let StepOutcome::Degraded(reason) = &gallery_sync {
        log.record(
            Stage::CommittingGalleryRepo,
            StepOutcome::Degraded(reason.clone()),
        );
    }

    let mut tagged = entry;
    tagged.repo = Some(request.repo.clone());
    let (gallery_entries, recovery) = match merge_gallery(gallery_wc.path(), tagged) {
        Ok(merged) => merged,
        Err(err) => {
            return log.fail(Stage::CommittingGalleryRepo, err.to_string(), Some(slide_id))
        }
    };
    if let Some(reason) = recovery {
        log.record(Stage::CommittingGalleryRepo, StepOutcome::Degraded(reason));
    }

    let gallery_paths = StageSet::Paths(vec![
        PathBuf::from(RECORD_FILENAME),
        PathBuf::from("index.html"),
        PathBuf::from("README.md"),
    ]);
    match gallery_wc.stage_and_commit(
        &gallery_paths,
        &format!("Update gallery index for slide {slide_id}"),
    ) {
        Ok(outcome) => log.record(Stage::CommittingGalleryRepo, commit_note(outcome)),
        Err(err) => {
            return log.fail(Stage::CommittingGalleryRepo, err.to_string(), Some(slide_id))
        }
    }

    progress.report(100, "done");
    log.record(Stage::Done, StepOutcome::Ok);
    PublishResult {
        steps: log.steps,
        success: true,
        failure: None,
        manifest: gallery_entries,
        slide_id: Some(slide_id),
    }
}

/// Sync a working copy, mapping failure to a degraded outcome. The pipeline
/// keeps going against local state; only pushing strictly needs the remote.
fn sync_outcome(wc: &WorkingCopy) -> StepOutcome {
    match wc.sync() {
        Ok(()) => StepOutcome::Ok,
        Err(err) => StepOutcome::Degraded(format!(
            "could not sync '{}' with origin, continuing with local state: {err}",
            wc.name()
        )),
    }
}

fn commit_note(outcome: CommitOutcome) -> StepOutcome {
    match outcome {
        CommitOutcome::NoOp => StepOutcome::Info("nothing to commit".into()),
        CommitOutcome::Committed { id } => StepOutcome::Info(format!("committed {id}")),
    }
}

/// Build the manifest entry for this publish. A re-publish of an existing id
/// keeps the original publication instant so identical inputs converge to
/// identical bytes.
fn build_entry(
    config: &PublishConfig,
    request: &PublishRequest,
    slide_id: &str,
    existing: &[GalleryEntry],
) -> GalleryEntry {
    let published_at = existing
        .iter()
        .find(|e| e.id == slide_id)
        .map(|e| e.published_at)
        .unwrap_or_else(now_whole_seconds);
    let page_url = config.slide_url(&request.repo, slide_id);
    let thumbnail_url = request
        .thumbnail
        .as_ref()
        .map(|_| format!("{page_url}thumbnail.jpg"));

    GalleryEntry {
        id: slide_id.to_string(),
        title: request.title.clone(),
        description: request.description.clone(),
        page_url,
        thumbnail_url,
        published_at,
        repo: None,
    }
}

/// Second precision, matching what the rendered page can carry.
fn now_whole_seconds() -> DateTime<Utc> {
    DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Move the tiled pyramid and optional thumbnail into the working copy,
/// replacing any previous content for this slide wholesale.
fn stage_slide_files(
    staging: &Path,
    slide_dir: &Path,
    thumbnail: Option<&Path>,
) -> std::io::Result<()> {
    if slide_dir.exists() {
        fs::remove_dir_all(slide_dir)?;
    }
    copy_dir_recursive(staging, slide_dir)?;
    if let Some(thumb) = thumbnail {
        fs::copy(thumb, slide_dir.join("thumbnail.jpg"))?;
    }
    Ok(())
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Rewrite a repository's index page, splicing into the existing template
/// when one is present.
fn write_index(repo_root: &Path, entries: &[GalleryEntry]) -> std::io::Result<()> {
    let index_path = repo_root.join("index.html");
    let existing = fs::read_to_string(&index_path).ok();
    fs::write(
        &index_path,
        manifest::render_page(entries, existing.as_deref()),
    )
}

/// Merge one tagged entry into the top-level gallery repository: structured
/// record, index page, and README all rewritten from the merged list.
///
/// The `gallery.json` record is the authoritative entry source. When it is
/// unreadable the existing index page is parsed instead (recovering what the
/// page still carries, minus repository tags) and the degradation is
/// reported to the caller.
fn merge_gallery(
    gallery_root: &Path,
    entry: GalleryEntry,
) -> Result<(Vec<GalleryEntry>, Option<String>), std::io::Error> {
    let record_path = gallery_root.join(RECORD_FILENAME);
    let (existing, recovery) = match types::load_records(&record_path) {
        Ok(entries) => (entries, None),
        Err(err) => {
            warn!(error = %err, "gallery record unreadable, recovering from index page");
            let page = fs::read_to_string(gallery_root.join("index.html")).unwrap_or_default();
            let recovered = manifest::parse(&page);
            let reason = format!(
                "gallery record unreadable ({err}); recovered {} entries from the index page",
                recovered.len()
            );
            (recovered, Some(reason))
        }
    };
    let merged = manifest::upsert(existing, entry);

    types::save_records(&record_path, &merged).map_err(io_of_record)?;
    write_index(gallery_root, &merged)?;
    fs::write(
        gallery_root.join("README.md"),
        manifest::render_markdown(&merged),
    )?;
    Ok((merged, recovery))
}

fn io_of_record(err: types::RecordError) -> std::io::Error {
    match err {
        types::RecordError::Io(io) => io,
        types::RecordError::Json(json) => std::io::Error::other(json),
    }
}
