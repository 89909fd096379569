//! Manifest parsing, merging, and rendering.
//!
//! The manifest is an ordered sequence of [`GalleryEntry`] with three
//! serialized forms:
//!
//! - an HTML fragment (`<ul id="slides">`) embedded inside a larger static
//!   page that this module treats as an opaque wrapper — only the list
//!   boundaries are parsed and replaced;
//! - a Markdown rendering for the repository README, derived purely from the
//!   structured entry list;
//! - the `gallery.json` structured record handled by [`crate::types`].
//!
//! ## Parsing
//!
//! The fragment is scanned by a small explicit parser rather than regular
//! expressions: the list is located by its `<ul>` boundaries, each `<li>` is
//! split out, and the link, title, description and optional thumbnail are
//! pulled from fixed child tags. Feed content is semi-structured and
//! partially hand-edited, so the parser fails permissively — an item that
//! does not match the expected shape is dropped (and logged) rather than
//! aborting the whole parse. No well-formed list at all is the empty case,
//! never an error.
//!
//! ## Determinism
//!
//! [`render`] produces byte-identical output for the same entry set and
//! order. This matters: the rendered page is committed to version control,
//! and spurious diffs would turn every publish into a noisy commit.
//!
//! ## HTML Generation
//!
//! Rendering uses [maud](https://maud.lambda.xyz/) — compile-time templates,
//! type-safe interpolation, auto-escaped by default.

use crate::types::GalleryEntry;
use chrono::{DateTime, SecondsFormat, Utc};
use maud::{html, PreEscaped, DOCTYPE};
use tracing::warn;

/// The `id` attribute marking the gallery list inside the page template.
const LIST_ID: &str = "slides";

// ============================================================================
// Parsing
// ============================================================================

/// Extract structured entries from an HTML fragment or full page.
///
/// Malformed items are dropped with a warning; a page without a well-formed
/// list yields an empty sequence.
pub fn parse(text: &str) -> Vec<GalleryEntry> {
    let Some((start, end)) = list_span(text) else {
        return Vec::new();
    };
    let list = &text[start..end];

    let mut entries = Vec::new();
    let mut rest = list;
    loop {
        let Some(open) = rest.find("<li") else { break };
        let after = &rest[open + 3..];
        let Some(tag_end) = after.find('>') else { break };
        let attrs = &after[..tag_end];
        let body_and_rest = &after[tag_end + 1..];
        let Some(close) = body_and_rest.find("</li>") else {
            break;
        };
        let body = &body_and_rest[..close];

        match parse_item(attrs, body) {
            Some(entry) => entries.push(entry),
            None => warn!(item = body, "dropping malformed gallery item"),
        }
        rest = &body_and_rest[close + "</li>".len()..];
    }
    entries
}

/// Locate the gallery list within a page. Returns the byte span covering
/// `<ul ...>` through `</ul>` inclusive.
///
/// Prefers the list carrying `id="slides"`; a hand-edited page that lost the
/// id falls back to the first `<ul>`. An unterminated list counts as "no
/// well-formed list found".
fn list_span(text: &str) -> Option<(usize, usize)> {
    let marker = format!("<ul id=\"{LIST_ID}\"");
    let start = text.find(&marker).or_else(|| text.find("<ul"))?;
    let close = text[start..].find("</ul>")?;
    Some((start, start + close + "</ul>".len()))
}

/// Parse one `<li>` item into an entry.
///
/// Required shape: a link (`href` + non-empty text). Description and
/// thumbnail are optional. The dedup key comes from `data-id`, falling back
/// to the last path segment of the page URL for hand-edited items.
fn parse_item(attrs: &str, body: &str) -> Option<GalleryEntry> {
    let page_url = child_attr(body, "<a", "href")?;
    let title = inner_text(body, "<a", "</a>").filter(|t| !t.is_empty())?;
    let description = inner_text(body, "<p", "</p>").unwrap_or_default();
    let thumbnail_url = child_attr(body, "<img", "src");

    let id = attr_value(attrs, "data-id")
        .filter(|s| !s.is_empty())
        .or_else(|| id_from_url(&page_url))?;
    let published_at = attr_value(attrs, "data-published")
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH);

    Some(GalleryEntry {
        id,
        title,
        description,
        page_url,
        thumbnail_url,
        published_at,
        repo: None,
    })
}

/// Pull a `name="value"` attribute out of a tag's attribute text.
fn attr_value(attrs: &str, name: &str) -> Option<String> {
    let marker = format!("{name}=\"");
    let start = attrs.find(&marker)? + marker.len();
    let end = attrs[start..].find('"')?;
    Some(unescape(&attrs[start..start + end]))
}

/// Find a child tag within an item body and pull an attribute from its
/// opening tag.
fn child_attr(body: &str, tag: &str, attr: &str) -> Option<String> {
    let open = body.find(tag)?;
    let rest = &body[open..];
    let tag_end = rest.find('>')?;
    attr_value(&rest[..tag_end], attr)
}

/// Extract the trimmed inner text between a child tag and its closing tag.
fn inner_text(body: &str, open_tag: &str, close_tag: &str) -> Option<String> {
    let open = body.find(open_tag)?;
    let rest = &body[open..];
    let content_start = rest.find('>')? + 1;
    let content_end = rest.find(close_tag)?;
    if content_end < content_start {
        return None;
    }
    Some(unescape(rest[content_start..content_end].trim()))
}

/// Last non-empty path segment of a URL, the original manifest's implicit key.
fn id_from_url(url: &str) -> Option<String> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Reverse the HTML escaping applied by rendering. `&amp;` goes last so
/// double-escaped text survives one round trip.
fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

// ============================================================================
// Merging
// ============================================================================

/// Update-if-present-else-insert keyed by `id`.
///
/// Replacing an existing entry preserves its position; a new entry is
/// appended. The result never contains two entries with the same `id`.
pub fn upsert(mut entries: Vec<GalleryEntry>, entry: GalleryEntry) -> Vec<GalleryEntry> {
    match entries.iter().position(|e| e.id == entry.id) {
        Some(idx) => entries[idx] = entry,
        None => entries.push(entry),
    }
    entries
}

/// Order entries for a full rebuild: `published_at` descending, ties broken
/// by `id` ascending so rebuilds are deterministic.
pub fn sort_for_rebuild(entries: &mut [GalleryEntry]) {
    entries.sort_by(|a, b| {
        b.published_at
            .cmp(&a.published_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

// ============================================================================
// Rendering
// ============================================================================

/// Render the gallery list fragment. Deterministic: the same entries in the
/// same order always yield byte-identical output.
pub fn render(entries: &[GalleryEntry]) -> String {
    html! {
        ul id=(LIST_ID) {
            @for entry in entries {
                li data-id=(entry.id)
                    data-published=(entry.published_at.to_rfc3339_opts(SecondsFormat::Secs, true)) {
                    a href=(entry.page_url) { (entry.title) }
                    p { (entry.description) }
                    @if let Some(thumb) = &entry.thumbnail_url {
                        img src=(thumb) alt="Thumbnail";
                    }
                }
            }
        }
    }
    .into_string()
}

/// Render the full index page, replacing only the list inside an existing
/// page template. The wrapper is opaque: everything outside the `<ul>` span
/// is preserved byte-for-byte. When no prior template exists (or it has no
/// well-formed list), a fresh page is synthesized around the fragment.
pub fn render_page(entries: &[GalleryEntry], existing: Option<&str>) -> String {
    let fragment = render(entries);
    if let Some(page) = existing {
        if let Some((start, end)) = list_span(page) {
            return format!("{}{}{}", &page[..start], fragment, &page[end..]);
        }
    }
    page_template("Slide Gallery", &fragment)
}

fn page_template(title: &str, fragment: &str) -> String {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
            }
            body {
                h1 { (title) }
                (PreEscaped(fragment))
            }
        }
    }
    .into_string()
}

/// Render the Markdown summary for the gallery README.
///
/// Derived purely from the structured entry list — it never assumes the HTML
/// fragment is available. Deterministic (no generated-at timestamp) to keep
/// commits minimal.
pub fn render_markdown(entries: &[GalleryEntry]) -> String {
    let mut out = String::new();
    out.push_str("# Slide Gallery\n\n");
    out.push_str("Interactive whole-slide images. Each slide is hosted in its own\n");
    out.push_str("repository; this index is regenerated on every publish.\n\n");
    out.push_str("## Slides\n\n");

    for entry in entries {
        let description = single_line(&entry.description);
        if description.is_empty() {
            out.push_str(&format!("- [**{}**]({})\n", entry.title, entry.page_url));
        } else {
            out.push_str(&format!(
                "- [**{}**]({}) - {}\n",
                entry.title, entry.page_url, description
            ));
        }
        if let Some(thumb) = &entry.thumbnail_url {
            out.push_str(&format!("  ![Thumbnail]({thumb})\n"));
        }
        out.push('\n');
    }

    out
}

/// Collapse a possibly multi-line description to one line for list contexts.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Render the per-slide README written next to each published pyramid.
pub fn render_slide_readme(entry: &GalleryEntry) -> String {
    let mut out = format!("# {}\n\n", entry.title);
    if !entry.description.is_empty() {
        out.push_str(&format!("{}\n\n", entry.description.trim_end()));
    }
    out.push_str(&format!("View the slide: {}\n", entry.page_url));
    out
}

/// Render the OpenSeadragon viewer page placed alongside a published pyramid.
///
/// The pyramid descriptor is always written as `slide.dzi`, so the viewer can
/// reference it relatively and works on any static host.
pub fn render_viewer(title: &str) -> String {
    const OSD_URL: &str = "https://openseadragon.github.io/openseadragon/openseadragon.min.js";
    const OSD_PREFIX: &str = "https://openseadragon.github.io/openseadragon/images/";
    let script = format!(
        "OpenSeadragon({{\n  id: \"viewer\",\n  prefixUrl: \"{OSD_PREFIX}\",\n  \
         tileSources: \"slide.dzi\",\n  showNavigator: true,\n  animationTime: 0.5,\n  \
         maxZoomPixelRatio: 2\n}});"
    );
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                title { (title) }
                script src=(OSD_URL) {}
                style { "body { margin: 0; padding: 0; } #viewer { width: 100%; height: 100vh; }" }
            }
            body {
                div id="viewer" {}
                script { (PreEscaped(script)) }
            }
        }
    }
    .into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{sample_entry, sample_entry_with_thumb};

    // =========================================================================
    // Round trips and determinism
    // =========================================================================

    #[test]
    fn render_parse_round_trip() {
        let entries = vec![
            sample_entry("gallery-01", 0),
            sample_entry_with_thumb("a1b2c3d4", 30),
        ];
        let parsed = parse(&render(&entries));
        assert_eq!(parsed, entries);
    }

    #[test]
    fn render_is_deterministic() {
        let entries = vec![sample_entry("gallery-01", 0), sample_entry("x9y8z7w6", 5)];
        assert_eq!(render(&entries), render(&entries));
        // stability through a full parse cycle
        assert_eq!(render(&parse(&render(&entries))), render(&entries));
    }

    #[test]
    fn escaped_characters_survive_round_trip() {
        let mut entry = sample_entry("gallery-01", 0);
        entry.title = "H&E <stain> \"40x\"".into();
        entry.description = "Tom's slide & more".into();

        let parsed = parse(&render(&[entry.clone()]));
        assert_eq!(parsed, vec![entry]);
    }

    #[test]
    fn multiline_description_round_trips_through_json_not_html() {
        // HTML rendering trims item text, so the canonical multi-line form
        // lives in gallery.json; the HTML carries the trimmed rendering.
        let mut entry = sample_entry("gallery-01", 0);
        entry.description = "line one\nline two".into();
        let parsed = parse(&render(&[entry]));
        assert_eq!(parsed[0].description, "line one\nline two");
    }

    // =========================================================================
    // Parsing edge cases
    // =========================================================================

    #[test]
    fn empty_page_parses_to_empty() {
        assert!(parse("").is_empty());
        assert!(parse("<html><body><h1>Gallery</h1></body></html>").is_empty());
    }

    #[test]
    fn unterminated_list_is_the_empty_case() {
        let text = "<ul id=\"slides\"><li><a href=\"x\">t</a></li>";
        assert!(parse(text).is_empty());
    }

    #[test]
    fn malformed_item_dropped_others_kept() {
        let good = sample_entry("gallery-01", 0);
        let mut page = render(&[good.clone()]);
        // hand-edited junk item with no link
        page = page.replace(
            "</ul>",
            "<li>scribbled note without a link</li></ul>",
        );

        let parsed = parse(&page);
        assert_eq!(parsed, vec![good]);
    }

    #[test]
    fn item_without_data_id_falls_back_to_url_segment() {
        let page = "<ul id=\"slides\">\
            <li><a href=\"https://x.github.io/gallery-07/\">Kidney</a><p>core</p></li>\
            </ul>";
        let parsed = parse(page);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, "gallery-07");
        assert_eq!(parsed[0].published_at, DateTime::UNIX_EPOCH);
    }

    #[test]
    fn hand_edited_list_without_id_attribute_still_found() {
        let page = "<html><body><ul>\
            <li><a href=\"https://x.github.io/gallery-02/\">Liver</a><p></p></li>\
            </ul></body></html>";
        assert_eq!(parse(page).len(), 1);
    }

    #[test]
    fn thumbnail_is_optional() {
        let with = sample_entry_with_thumb("a", 0);
        let without = sample_entry("b", 0);
        let parsed = parse(&render(&[with.clone(), without.clone()]));
        assert_eq!(parsed[0].thumbnail_url, with.thumbnail_url);
        assert_eq!(parsed[1].thumbnail_url, None);
    }

    // =========================================================================
    // Upsert properties
    // =========================================================================

    #[test]
    fn upsert_appends_new_entry_last() {
        let entries = vec![sample_entry("a", 0)];
        let result = upsert(entries, sample_entry("b", 1));
        assert_eq!(result.len(), 2);
        assert_eq!(result[1].id, "b");
    }

    #[test]
    fn upsert_replaces_in_place() {
        let entries = vec![
            sample_entry("a", 0),
            sample_entry("b", 1),
            sample_entry("c", 2),
        ];
        let mut updated = sample_entry("b", 3);
        updated.description = "re-scanned at 40x".into();

        let result = upsert(entries, updated.clone());
        assert_eq!(result.len(), 3);
        assert_eq!(result[1], updated); // same position
        assert_eq!(result[0].id, "a");
        assert_eq!(result[2].id, "c");
    }

    #[test]
    fn upsert_is_idempotent() {
        let entry = sample_entry("gallery-01", 0);
        let once = upsert(Vec::new(), entry.clone());
        let twice = upsert(once.clone(), entry);
        assert_eq!(once, twice);
    }

    #[test]
    fn upsert_never_duplicates_ids() {
        let mut entries = Vec::new();
        for id in ["a", "b", "a", "c", "b", "a"] {
            entries = upsert(entries, sample_entry(id, 0));
        }
        let mut ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), entries.len());
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), entries.len());
    }

    #[test]
    fn sort_for_rebuild_newest_first() {
        let mut entries = vec![
            sample_entry("old", 0),
            sample_entry("new", 120),
            sample_entry("mid", 60),
        ];
        sort_for_rebuild(&mut entries);
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn sort_for_rebuild_ties_break_by_id() {
        let mut entries = vec![sample_entry("b", 0), sample_entry("a", 0)];
        sort_for_rebuild(&mut entries);
        assert_eq!(entries[0].id, "a");
    }

    // =========================================================================
    // Page splicing
    // =========================================================================

    #[test]
    fn render_page_preserves_wrapper() {
        let entries = vec![sample_entry("a", 0)];
        let page = render_page(&entries, None);
        assert!(page.contains("<!DOCTYPE html>"));

        // splice new entries into the existing page; wrapper untouched
        let more = upsert(entries, sample_entry("b", 1));
        let updated = render_page(&more, Some(&page));
        assert!(updated.contains("data-id=\"b\""));
        assert!(updated.starts_with("<!DOCTYPE html>"));
        assert_eq!(parse(&updated).len(), 2);
    }

    #[test]
    fn render_page_with_custom_wrapper() {
        let wrapper = format!(
            "<html><head><title>My Lab</title></head><body><h1>Custom</h1>{}</body></html>",
            render(&[sample_entry("a", 0)])
        );
        let updated = render_page(&[sample_entry("a", 0), sample_entry("b", 1)], Some(&wrapper));
        assert!(updated.contains("<h1>Custom</h1>"));
        assert!(updated.contains("<title>My Lab</title>"));
        assert_eq!(parse(&updated).len(), 2);
    }

    #[test]
    fn render_page_without_list_synthesizes_template() {
        let broken = "<html><body><p>no list here</p></body></html>";
        let page = render_page(&[sample_entry("a", 0)], Some(broken));
        assert!(page.contains("<ul id=\"slides\">"));
        assert_eq!(parse(&page).len(), 1);
    }

    #[test]
    fn empty_manifest_renders_well_formed_empty_list() {
        let page = render_page(&[], None);
        assert!(page.contains("<ul id=\"slides\"></ul>"));
        assert!(parse(&page).is_empty());
    }

    // =========================================================================
    // Markdown and auxiliary renderings
    // =========================================================================

    #[test]
    fn markdown_lists_entries_with_links() {
        let entries = vec![sample_entry_with_thumb("a1b2c3d4", 0)];
        let md = render_markdown(&entries);
        assert!(md.contains("- [**Lung Biopsy a1b2c3d4**]"));
        assert!(md.contains("![Thumbnail]"));
        // deterministic — no timestamps
        assert_eq!(md, render_markdown(&entries));
    }

    #[test]
    fn markdown_collapses_multiline_descriptions() {
        let mut entry = sample_entry("a", 0);
        entry.description = "first line\nsecond line".into();
        let md = render_markdown(&[entry]);
        assert!(md.contains("first line second line"));
    }

    #[test]
    fn slide_readme_contains_link() {
        let entry = sample_entry("a1b2c3d4", 0);
        let readme = render_slide_readme(&entry);
        assert!(readme.starts_with("# Lung Biopsy a1b2c3d4\n"));
        assert!(readme.contains(&entry.page_url));
    }

    #[test]
    fn viewer_references_relative_descriptor() {
        let viewer = render_viewer("Lung Biopsy");
        assert!(viewer.contains("tileSources: \"slide.dzi\""));
        assert!(viewer.contains("<title>Lung Biopsy</title>"));
    }
}
