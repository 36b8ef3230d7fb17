//! Markdown structure and reference extraction for docgraph.
//!
//! Two pure passes over document text:
//! - [`extract_sections`] splits raw text into ordered, anchored sections
//! - [`extract_references`] finds cross-document reference tokens
//!
//! Neither pass can fail; malformed input simply yields fewer results.

use std::sync::LazyLock;

use regex::Regex;

mod refs;
mod sections;

pub use refs::{
    RefToken, bracketed_refs, external_references, extract_references, inline_refs, link_refs,
};
pub use sections::{extract_sections, sections_for, slugify};

/// Extract the title from the first H1 in the Markdown text.
pub fn extract_title(md: &str) -> Option<String> {
    static H1_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^# (.+)$").expect("valid regex"));

    H1_RE
        .captures(md)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_from_first_h1() {
        assert_eq!(
            extract_title("intro\n## Sub\n# Design Statement\n# Later"),
            Some("Design Statement".to_string())
        );
        assert_eq!(extract_title("## Only sub"), None);
    }
}
