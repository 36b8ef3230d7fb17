//! Section salience scoring.
//!
//! Rules are summed, not exclusive:
//! - [`DENSE_REFERENCE_BONUS`] for two or more distinct external references
//! - [`KEYWORD_BONUS`] when the heading's leading word starts with a keyword
//! - [`LARGE_SECTION_PENALTY`] for long content with fewer than three references

use docgraph_markdown::external_references;
use docgraph_shared::{Document, ScoringConfig, Section};

/// Awarded when the content references at least [`DENSE_REFERENCE_MIN`] other documents.
pub const DENSE_REFERENCE_BONUS: i64 = 3;
pub const DENSE_REFERENCE_MIN: usize = 2;

/// Awarded when the heading's leading word matches a configured keyword prefix.
pub const KEYWORD_BONUS: i64 = 2;

/// Applied to content over the size limit with fewer than [`LARGE_SECTION_REFERENCE_MIN`] references.
pub const LARGE_SECTION_PENALTY: i64 = -2;
pub const LARGE_SECTION_REFERENCE_MIN: usize = 3;

/// Score one section of `document`.
pub fn score_section(document: &Document, section: &Section, config: &ScoringConfig) -> i64 {
    let references =
        external_references(&section.content, &document.id(), &document.slug).len();

    let mut score = 0;

    if references >= DENSE_REFERENCE_MIN {
        score += DENSE_REFERENCE_BONUS;
    }

    if heading_matches_keyword(&section.heading, &config.keywords) {
        score += KEYWORD_BONUS;
    }

    if section.content.chars().count() > config.large_section_char_limit
        && references < LARGE_SECTION_REFERENCE_MIN
    {
        score += LARGE_SECTION_PENALTY;
    }

    score
}

/// Case-insensitive prefix match of the heading's first word against any keyword.
fn heading_matches_keyword(heading: &str, keywords: &[String]) -> bool {
    let Some(first) = heading.split_whitespace().next() else {
        return false;
    };
    let first = first.to_lowercase();

    keywords
        .iter()
        .filter(|k| !k.trim().is_empty())
        .any(|k| first.starts_with(&k.trim().to_lowercase()))
}
