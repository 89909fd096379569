//! CLI output formatting for pipeline results.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. The primary display
//! for every entity (stage, slide, repository) is its semantic identity, with
//! filesystem or URL detail shown as secondary context via indented lines.
//! A publish report reads as the story of the run; the file list is context.
//!
//! # Output Format
//!
//! ## Publish
//!
//! ```text
//! Publish a1b2c3d4
//!     received: ok
//!     tiling: ok
//!     staging files: ok
//!     merging manifest: ok
//!     committing slide repository: committed 3f9c21...
//!     committing gallery repository: committed 81ab07...
//!     done: ok
//! Published slide a1b2c3d4 (3 slides in gallery)
//! ```
//!
//! ## Rebuild
//!
//! ```text
//! Gallery rebuild
//!     001 Lung Biopsy
//!         Source: gallery-02
//!         Published: 2026-03-01T13:30:00Z
//!     002 Kidney Core
//!         Source: gallery-01
//!         Published: 2026-03-01T12:00:00Z
//!     Skipped: gallery-03 (unreadable record)
//! Rebuilt gallery from 2 slides across 2 repositories
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure — no I/O, no side effects.

use crate::aggregate::AggregateResult;
use crate::publish::{PublishResult, StepOutcome};
use crate::types::GalleryEntry;
use chrono::SecondsFormat;
use std::collections::BTreeSet;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn outcome_note(outcome: &StepOutcome) -> String {
    match outcome {
        StepOutcome::Ok => "ok".to_string(),
        StepOutcome::Info(note) => note.clone(),
        StepOutcome::Degraded(reason) => format!("degraded: {reason}"),
        StepOutcome::Failed(reason) => format!("failed: {reason}"),
    }
}

/// Format one entry as an indexed header plus indented context lines.
fn entry_lines(index: usize, entry: &GalleryEntry, indent: &str) -> Vec<String> {
    let mut lines = vec![format!("{indent}{} {}", format_index(index), entry.title)];
    if let Some(repo) = &entry.repo {
        lines.push(format!("{indent}    Source: {repo}"));
    }
    lines.push(format!(
        "{indent}    Published: {}",
        entry
            .published_at
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    lines.push(format!("{indent}    URL: {}", entry.page_url));
    lines
}

// ============================================================================
// Publish report
// ============================================================================

/// Format a publish run: one line per stage, then a one-line verdict.
pub fn format_publish_report(result: &PublishResult) -> Vec<String> {
    let mut lines = Vec::new();

    match &result.slide_id {
        Some(id) => lines.push(format!("Publish {id}")),
        None => lines.push("Publish".to_string()),
    }
    for step in &result.steps {
        lines.push(format!("    {}: {}", step.stage, outcome_note(&step.outcome)));
    }

    match (&result.failure, &result.slide_id) {
        (Some(failure), _) => lines.push(format!(
            "Publish failed at {}: {}",
            failure.stage, failure.reason
        )),
        (None, Some(id)) => lines.push(format!(
            "Published slide {id} ({} slides in gallery)",
            result.manifest.len()
        )),
        (None, None) => lines.push("Published".to_string()),
    }
    lines
}

/// Print a publish report to stdout.
pub fn print_publish_report(result: &PublishResult) {
    for line in format_publish_report(result) {
        println!("{}", line);
    }
}

// ============================================================================
// Rebuild report
// ============================================================================

/// Format an aggregation run: indexed slide inventory plus skip notices.
pub fn format_aggregate_report(result: &AggregateResult) -> Vec<String> {
    let mut lines = vec!["Gallery rebuild".to_string()];

    for (i, entry) in result.entries.iter().enumerate() {
        lines.extend(entry_lines(i + 1, entry, "    "));
    }
    for repo in &result.skipped {
        lines.push(format!("    Skipped: {repo} (unreadable record)"));
    }

    let repos: BTreeSet<&str> = result
        .entries
        .iter()
        .filter_map(|e| e.repo.as_deref())
        .collect();
    lines.push(format!(
        "Rebuilt gallery from {} slides across {} repositories",
        result.entries.len(),
        repos.len()
    ));
    lines
}

/// Print a rebuild report to stdout.
pub fn print_aggregate_report(result: &AggregateResult) {
    for line in format_aggregate_report(result) {
        println!("{}", line);
    }
}

// ============================================================================
// Parse report
// ============================================================================

/// Format parsed manifest entries for inspection.
pub fn format_parse_report(entries: &[GalleryEntry]) -> Vec<String> {
    let mut lines = vec![format!("Parsed {} entries", entries.len())];
    for (i, entry) in entries.iter().enumerate() {
        lines.extend(entry_lines(i + 1, entry, "    "));
    }
    lines
}

/// Print a parse report to stdout.
pub fn print_parse_report(entries: &[GalleryEntry]) {
    for line in format_parse_report(entries) {
        println!("{}", line);
    }
}
