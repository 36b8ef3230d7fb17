//! Section extraction: raw Markdown text → ordered, anchored sections.
//!
//! The extractor is total: any input string yields zero or more sections and
//! never fails.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use docgraph_shared::{Document, Section};

/// Matches an ATX heading marker of depth 1–6 followed by heading text.
static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(#{1,6})[ \t]+(.+)$").expect("heading regex")
});

/// Matches a trailing inline annotation such as `[draft]` or `[v2]`.
static ANNOTATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*\[[^\[\]]*\]\s*$").expect("annotation regex")
});

/// Split raw text into sections.
///
/// A heading line starts a new section and closes the previous one; every
/// following line up to the next heading is that section's content. Text
/// before the first heading belongs to no section. Lines inside fenced code
/// blocks never count as headings.
///
/// Identical anchors collide: the later heading and content overwrite the
/// earlier slot, which keeps its original `order`.
pub fn extract_sections(text: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut by_anchor: HashMap<String, usize> = HashMap::new();
    let mut current: Option<(String, Vec<&str>)> = None;
    let mut in_fence = false;

    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
        }

        let heading = if in_fence {
            None
        } else {
            HEADING_RE.captures(line).map(|caps| clean_heading(&caps[2]))
        };

        match heading {
            Some(heading) => {
                if let Some((prev, lines)) = current.take() {
                    push_section(&mut sections, &mut by_anchor, prev, &lines);
                }
                current = Some((heading, Vec::new()));
            }
            None => {
                if let Some((_, lines)) = current.as_mut() {
                    lines.push(line);
                }
            }
        }
    }

    if let Some((prev, lines)) = current.take() {
        push_section(&mut sections, &mut by_anchor, prev, &lines);
    }

    sections
}

/// The sections of a document: pre-parsed ones if supplied, otherwise parsed
/// from its raw text.
///
/// Supplied anchors go through [`slugify`]; one that slugifies to nothing is
/// derived from the heading instead.
pub fn sections_for(document: &Document) -> Vec<Section> {
    match &document.sections {
        Some(sections) => sections
            .iter()
            .map(|s| {
                let mut s = s.clone();
                let anchor = slugify(&s.anchor);
                s.anchor = if anchor.is_empty() {
                    anchor_for(&s.heading, s.order)
                } else {
                    anchor
                };
                s
            })
            .collect(),
        None => extract_sections(&document.text),
    }
}

/// Strict slugification: lowercase, ASCII alphanumeric runs kept, every
/// other run collapsed to a single `-`, no leading or trailing `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Trim the heading and drop a trailing bracketed annotation.
fn clean_heading(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = ANNOTATION_RE.replace(trimmed, "");
    if stripped.trim().is_empty() {
        trimmed.to_string()
    } else {
        stripped.trim().to_string()
    }
}

/// Slug of the heading, or `section-{order}` when the heading has no
/// alphanumeric characters at all.
fn anchor_for(heading: &str, order: usize) -> String {
    let slug = slugify(heading);
    if slug.is_empty() {
        format!("section-{order}")
    } else {
        slug
    }
}

fn push_section(
    sections: &mut Vec<Section>,
    by_anchor: &mut HashMap<String, usize>,
    heading: String,
    lines: &[&str],
) {
    let order = sections.len();
    let anchor = anchor_for(&heading, order);
    let content = lines.join("\n").trim().to_string();

    if let Some(&idx) = by_anchor.get(&anchor) {
        debug!(%anchor, "duplicate anchor, later section wins");
        let slot = &mut sections[idx];
        slot.heading = heading;
        slot.content = content;
        return;
    }

    by_anchor.insert(anchor.clone(), order);
    sections.push(Section {
        heading,
        anchor,
        content,
        order,
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use docgraph_shared::DocKind;

    #[test]
    fn splits_on_headings_of_any_depth() {
        let text = "Preamble is ignored\n# Overview\nIntro line\n## Risks\nR1\nR2\n###### Deep\nleaf";
        let sections = extract_sections(text);

        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].heading, "Overview");
        assert_eq!(sections[0].content, "Intro line");
        assert_eq!(sections[1].anchor, "risks");
        assert_eq!(sections[1].content, "R1\nR2");
        assert_eq!(sections[2].order, 2);
        assert_eq!(sections[2].content, "leaf");
    }

    #[test]
    fn seven_hashes_is_not_a_heading() {
        let sections = extract_sections("# Top\n####### not a heading");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].content, "####### not a heading");
    }

    #[test]
    fn strips_trailing_annotation() {
        let sections = extract_sections("## Decision Log [draft]\nbody");
        assert_eq!(sections[0].heading, "Decision Log");
        assert_eq!(sections[0].anchor, "decision-log");
    }

    #[test]
    fn headings_inside_code_fences_are_content() {
        let text = "# Setup\n```sh\n# install deps\nmake\n```\nafter";
        let sections = extract_sections(text);
        assert_eq!(sections.len(), 1);
        assert!(sections[0].content.contains("# install deps"));
        assert!(sections[0].content.ends_with("after"));
    }

    #[test]
    fn duplicate_headings_last_one_wins() {
        let text = "# Notes\nfirst\n# Other\nx\n# Notes\nsecond";
        let sections = extract_sections(text);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].anchor, "notes");
        assert_eq!(sections[0].content, "second");
        assert_eq!(sections[0].order, 0);
    }

    #[test]
    fn total_over_arbitrary_input() {
        assert!(extract_sections("").is_empty());
        assert!(extract_sections("no headings here\n\njust prose").is_empty());
        assert!(extract_sections("#notaheading").is_empty());
        let sections = extract_sections("# !!!\n");
        assert_eq!(sections[0].anchor, "section-0");
    }

    #[test]
    fn slugify_is_strict() {
        assert_eq!(slugify("Risk Register: Q3 (2024)"), "risk-register-q3-2024");
        assert_eq!(slugify("  --Hello__World--  "), "hello-world");
        assert_eq!(slugify("Don't Panic"), "don-t-panic");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn pre_parsed_sections_skip_parsing() {
        let doc = Document::new(DocKind::X, "current", "X", "# Ignored\nbody").with_sections(vec![
            Section {
                heading: "Risk Summary".into(),
                anchor: String::new(),
                content: "c".into(),
                order: 0,
            },
        ]);
        let sections = sections_for(&doc);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].anchor, "risk-summary");
    }

    #[test]
    fn supplied_anchors_are_slugified() {
        let section = |heading: &str, anchor: &str, order| Section {
            heading: heading.into(),
            anchor: anchor.into(),
            content: String::new(),
            order,
        };
        let doc = Document::new(DocKind::X, "current", "X", "").with_sections(vec![
            section("Risk", "b#c", 0),
            section("Open Items", "Open Items", 1),
            section("Decision", "##", 2),
            section("!!!", "", 3),
        ]);

        let anchors: Vec<String> = sections_for(&doc).into_iter().map(|s| s.anchor).collect();
        assert_eq!(anchors, vec!["b-c", "open-items", "decision", "section-3"]);
    }

    #[test]
    fn raw_text_parsed_when_no_sections() {
        let doc = Document::new(DocKind::Ds, "current", "DS", "# A\n1\n# B\n2");
        assert_eq!(sections_for(&doc).len(), 2);
    }
}
