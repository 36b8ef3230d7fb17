//! Cross-document reference extraction.
//!
//! Three independent matchers run over the same text and their matches are
//! unioned into one set:
//! - bracketed: `[[DS:current]]` or `[[current]]`
//! - Markdown link target: `[text](current)` or `[text](/docs/current)`
//! - bare inline: `DS:current` anywhere in prose
//!
//! This is a syntactic pass only; nothing here knows which documents exist.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

/// `[[KIND:slug]]` or `[[slug]]`, KIND being 1–2 letters of either case.
static BRACKETED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[(?:([A-Za-z]{1,2}):)?([a-z0-9][a-z0-9-]*)\]\]").expect("bracketed ref regex")
});

/// Link target `](slug)` or `](/docs/slug)`.
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\]\((?:/docs/)?([a-z0-9][a-z0-9-]*)\)").expect("link ref regex")
});

/// Standalone `KIND:slug` with an uppercase 1–2 letter kind.
static INLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z]{1,2}):([a-z0-9][a-z0-9-]*)\b").expect("inline ref regex")
});

/// A reference token found in text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RefToken {
    /// `KIND:slug`; the kind is normalized to uppercase.
    Qualified { kind: String, slug: String },
    /// A slug without a kind prefix.
    Bare(String),
}

impl RefToken {
    /// True when this token points back at the document `doc_id` / `slug`.
    pub fn is_self_reference(&self, doc_id: &str, slug: &str) -> bool {
        match self {
            RefToken::Qualified { .. } => self.to_string() == doc_id,
            RefToken::Bare(s) => s == slug,
        }
    }
}

impl std::fmt::Display for RefToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefToken::Qualified { kind, slug } => write!(f, "{kind}:{slug}"),
            RefToken::Bare(slug) => f.write_str(slug),
        }
    }
}

/// Union of all three matchers over `text`, deduplicated.
pub fn extract_references(text: &str) -> BTreeSet<RefToken> {
    let mut refs = bracketed_refs(text);
    refs.extend(link_refs(text));
    refs.extend(inline_refs(text));
    refs
}

/// Distinct references in `text` that do not point at the owning document.
pub fn external_references(text: &str, doc_id: &str, slug: &str) -> BTreeSet<RefToken> {
    extract_references(text)
        .into_iter()
        .filter(|r| !r.is_self_reference(doc_id, slug))
        .collect()
}

pub fn bracketed_refs(text: &str) -> BTreeSet<RefToken> {
    BRACKETED_RE
        .captures_iter(text)
        .map(|caps| match caps.get(1) {
            Some(kind) => RefToken::Qualified {
                kind: kind.as_str().to_ascii_uppercase(),
                slug: caps[2].to_string(),
            },
            None => RefToken::Bare(caps[2].to_string()),
        })
        .collect()
}

pub fn link_refs(text: &str) -> BTreeSet<RefToken> {
    LINK_RE
        .captures_iter(text)
        .map(|caps| RefToken::Bare(caps[1].to_string()))
        .collect()
}

pub fn inline_refs(text: &str) -> BTreeSet<RefToken> {
    INLINE_RE
        .captures_iter(text)
        .map(|caps| RefToken::Qualified {
            kind: caps[1].to_string(),
            slug: caps[2].to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qualified(kind: &str, slug: &str) -> RefToken {
        RefToken::Qualified {
            kind: kind.into(),
            slug: slug.into(),
        }
    }

    #[test]
    fn bracketed_with_and_without_kind() {
        let refs = bracketed_refs("see [[DS:current]] and [[sp:draft-2]] and [[notes]]");
        assert!(refs.contains(&qualified("DS", "current")));
        assert!(refs.contains(&qualified("SP", "draft-2")));
        assert!(refs.contains(&RefToken::Bare("notes".into())));
        assert_eq!(refs.len(), 3);
    }

    #[test]
    fn bracketed_rejects_long_kinds_and_uppercase_slugs() {
        assert!(bracketed_refs("[[ABC:current]]").is_empty());
        assert!(bracketed_refs("[[DS:Current]]").is_empty());
    }

    #[test]
    fn link_targets() {
        let refs = link_refs("[design](current) and [plan](/docs/plan-b) and [web](https://x.io)");
        assert_eq!(
            refs.into_iter().collect::<Vec<_>>(),
            vec![RefToken::Bare("current".into()), RefToken::Bare("plan-b".into())]
        );
    }

    #[test]
    fn inline_tokens_in_prose() {
        let refs = inline_refs("Derived from DS:current, informed by X:risks-q3.");
        assert!(refs.contains(&qualified("DS", "current")));
        assert!(refs.contains(&qualified("X", "risks-q3")));
        assert!(inline_refs("https://example.com and ABC:foo and ds:lower").is_empty());
    }

    #[test]
    fn union_counts_a_token_once() {
        let refs = extract_references("[[DS:current]] mentions DS:current twice: DS:current");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs.iter().next().unwrap().to_string(), "DS:current");
    }

    #[test]
    fn forms_are_not_mutually_exclusive() {
        let refs = extract_references("[[SP:current]] then [x](/docs/other) then M:current");
        let rendered: Vec<String> = refs.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["M:current", "SP:current", "other"]);
    }

    #[test]
    fn self_references_are_filtered() {
        let refs = external_references("DS:current X:current [[current]] [[other]]", "DS:current", "current");
        let rendered: Vec<String> = refs.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["X:current", "other"]);
    }
}
