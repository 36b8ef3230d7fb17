//! Core domain types: documents, sections, and the selection payload.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DocGraphError;

// ---------------------------------------------------------------------------
// DocKind
// ---------------------------------------------------------------------------

/// The fixed set of generated document kinds.
///
/// Ordering follows declaration order and defines bundle iteration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DocKind {
    #[serde(rename = "DS", alias = "ds")]
    Ds,
    #[serde(rename = "SP", alias = "sp")]
    Sp,
    #[serde(rename = "X", alias = "x")]
    X,
    #[serde(rename = "M", alias = "m")]
    M,
}

impl DocKind {
    /// All kinds in bundle order.
    pub const ALL: [DocKind; 4] = [DocKind::Ds, DocKind::Sp, DocKind::X, DocKind::M];

    /// The short uppercase tag used in document ids (`"DS"`, `"SP"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            DocKind::Ds => "DS",
            DocKind::Sp => "SP",
            DocKind::X => "X",
            DocKind::M => "M",
        }
    }

    /// The kind this kind is derived from, if any (X and SP derive from DS).
    pub fn derived_from(&self) -> Option<DocKind> {
        match self {
            DocKind::X | DocKind::Sp => Some(DocKind::Ds),
            DocKind::Ds | DocKind::M => None,
        }
    }
}

impl std::fmt::Display for DocKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocKind {
    type Err = DocGraphError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        DocKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DocGraphError::validation(format!("unknown document kind `{s}`")))
    }
}

/// Build a document id from its kind tag and slug (`"DS:current"`).
pub fn document_id(kind: &str, slug: &str) -> String {
    format!("{kind}:{slug}")
}

/// Split a document id into `(kind, slug)`. Ids without a `:` have an empty kind.
pub fn split_document_id(id: &str) -> (&str, &str) {
    id.split_once(':').unwrap_or(("", id))
}

/// Slugs are `[a-z0-9][a-z0-9-]*`. Anything else could alias another
/// document id or component key.
pub fn is_valid_slug(slug: &str) -> bool {
    slug.chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

// ---------------------------------------------------------------------------
// Section / Document
// ---------------------------------------------------------------------------

/// A titled section of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Heading text with markers and trailing annotations removed.
    pub heading: String,
    /// URL-safe slug derived from the heading. Empty means "derive it".
    #[serde(default)]
    pub anchor: String,
    /// Raw text under the heading, up to the next heading.
    #[serde(default)]
    pub content: String,
    /// Zero-based position within the document.
    #[serde(default)]
    pub order: usize,
}

/// A generated document, supplied fresh on every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub kind: DocKind,
    pub slug: String,
    pub title: String,
    /// Pre-parsed sections. When present, `text` is not parsed for sections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<Section>>,
    /// Original raw text.
    #[serde(default)]
    pub text: String,
}

impl Document {
    /// Create a document from raw text.
    pub fn new(
        kind: DocKind,
        slug: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            slug: slug.into(),
            title: title.into(),
            sections: None,
            text: text.into(),
        }
    }

    /// Attach pre-parsed sections.
    pub fn with_sections(mut self, sections: Vec<Section>) -> Self {
        self.sections = Some(sections);
        self
    }

    /// The document id, `KIND:slug`.
    pub fn id(&self) -> String {
        document_id(self.kind.as_str(), &self.slug)
    }
}

// ---------------------------------------------------------------------------
// DocumentBundle
// ---------------------------------------------------------------------------

/// At most one document per kind, iterated in kind order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "BundleFile", into = "BundleFile")]
pub struct DocumentBundle {
    documents: BTreeMap<DocKind, Document>,
}

impl DocumentBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document, returning the one it replaced (same kind), if any.
    pub fn insert(&mut self, document: Document) -> Option<Document> {
        self.documents.insert(document.kind, document)
    }

    pub fn get(&self, kind: DocKind) -> Option<&Document> {
        self.documents.get(&kind)
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl FromIterator<Document> for DocumentBundle {
    fn from_iter<I: IntoIterator<Item = Document>>(iter: I) -> Self {
        let mut bundle = Self::new();
        for doc in iter {
            bundle.insert(doc);
        }
        bundle
    }
}

/// On-disk shape of a bundle: `{ "documents": [...] }`.
#[derive(Serialize, Deserialize)]
struct BundleFile {
    documents: Vec<Document>,
}

impl From<BundleFile> for DocumentBundle {
    fn from(file: BundleFile) -> Self {
        file.documents.into_iter().collect()
    }
}

impl From<DocumentBundle> for BundleFile {
    fn from(bundle: DocumentBundle) -> Self {
        Self {
            documents: bundle.documents.into_values().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Selection payload
// ---------------------------------------------------------------------------

/// Properties of a Document node as persisted by the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentNode {
    pub id: String,
    pub kind: DocKind,
    pub slug: String,
    pub title: String,
}

impl From<&Document> for DocumentNode {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id(),
            kind: doc.kind,
            slug: doc.slug.clone(),
            title: doc.title.clone(),
        }
    }
}

/// A selected section, persisted as a Component node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    /// Content-addressed id of `(doc_id, anchor)`.
    pub id: String,
    /// Owning document id.
    pub doc_id: String,
    /// First whitespace-delimited token of the heading.
    #[serde(rename = "type")]
    pub component_type: String,
    /// Full heading text.
    pub title: String,
    pub anchor: String,
    pub order: usize,
    pub score: i64,
}

/// "src mentions dst", extracted from src's text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub src: String,
    pub dst: String,
}

/// "src was derived from dst". Derivation edges must stay acyclic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Derivation {
    pub src: String,
    pub dst: String,
}

/// Everything one run wants the graph store to reflect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionPayload {
    /// Version tag stamped onto every persisted node.
    #[serde(rename = "selection_v")]
    pub selection_v: String,
    pub documents: Vec<DocumentNode>,
    pub components: Vec<Component>,
    pub references: Vec<Reference>,
    pub derivations: Vec<Derivation>,
    /// Component ids each document should own after reconciliation.
    pub keep_by_doc: BTreeMap<String, Vec<String>>,
}

impl SelectionPayload {
    /// Document nodes plus component nodes (reference stubs not counted).
    pub fn node_count(&self) -> usize {
        self.documents.len() + self.components.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_kind_parse_and_display() {
        assert_eq!("ds".parse::<DocKind>().unwrap(), DocKind::Ds);
        assert_eq!("SP".parse::<DocKind>().unwrap(), DocKind::Sp);
        assert_eq!(DocKind::X.to_string(), "X");
        assert!("Q".parse::<DocKind>().is_err());
    }

    #[test]
    fn derivation_targets() {
        assert_eq!(DocKind::X.derived_from(), Some(DocKind::Ds));
        assert_eq!(DocKind::Sp.derived_from(), Some(DocKind::Ds));
        assert_eq!(DocKind::Ds.derived_from(), None);
        assert_eq!(DocKind::M.derived_from(), None);
    }

    #[test]
    fn document_id_format() {
        let doc = Document::new(DocKind::Ds, "current", "Design Statement", "");
        assert_eq!(doc.id(), "DS:current");
        assert_eq!(split_document_id("SP:current"), ("SP", "current"));
        assert_eq!(split_document_id("orphan"), ("", "orphan"));
    }

    #[test]
    fn slug_rule() {
        assert!(is_valid_slug("current"));
        assert!(is_valid_slug("plan-2"));
        assert!(is_valid_slug("0day"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("-lead"));
        assert!(!is_valid_slug("Current"));
        assert!(!is_valid_slug("a#b"));
        assert!(!is_valid_slug("a:b"));
    }

    #[test]
    fn bundle_keeps_one_document_per_kind() {
        let mut bundle = DocumentBundle::new();
        bundle.insert(Document::new(DocKind::X, "a", "A", ""));
        bundle.insert(Document::new(DocKind::Ds, "b", "B", ""));
        let replaced = bundle.insert(Document::new(DocKind::X, "c", "C", ""));

        assert_eq!(replaced.map(|d| d.slug), Some("a".to_string()));
        assert_eq!(bundle.len(), 2);
        let order: Vec<_> = bundle.documents().map(|d| d.id()).collect();
        assert_eq!(order, vec!["DS:b", "X:c"]);
    }

    #[test]
    fn bundle_json_roundtrip() {
        let json = r###"{
            "documents": [
                { "kind": "DS", "slug": "current", "title": "DS", "text": "## Goal\nShip" },
                { "kind": "X", "slug": "current", "title": "X",
                  "sections": [{ "heading": "Risk one", "content": "body" }] }
            ]
        }"###;
        let bundle: DocumentBundle = serde_json::from_str(json).expect("parse bundle");
        assert_eq!(bundle.len(), 2);
        let x = bundle.get(DocKind::X).expect("X present");
        assert_eq!(x.sections.as_ref().map(Vec::len), Some(1));
        assert!(x.text.is_empty());

        let out = serde_json::to_string(&bundle).expect("serialize");
        assert!(out.contains("\"documents\""));
    }

    #[test]
    fn payload_serializes_with_wire_names() {
        let mut payload = SelectionPayload {
            selection_v: "v1".into(),
            ..Default::default()
        };
        payload
            .keep_by_doc
            .insert("DS:current".into(), vec!["abc".into()]);
        payload.components.push(Component {
            id: "abc".into(),
            doc_id: "DS:current".into(),
            component_type: "Risk".into(),
            title: "Risk register".into(),
            anchor: "risk-register".into(),
            order: 0,
            score: 3,
        });

        let json = serde_json::to_string(&payload).expect("serialize");
        assert!(json.contains("\"keepByDoc\""));
        assert!(json.contains("\"selection_v\""));
        assert!(json.contains("\"type\":\"Risk\""));
        assert!(json.contains("\"docId\""));
        assert_eq!(payload.node_count(), 1);
    }
}
