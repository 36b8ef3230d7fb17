//! Selection: document bundle → [`SelectionPayload`].
//!
//! Pure over its inputs: no I/O, no clock, no randomness. Running it twice on
//! the same bundle and config yields an identical payload.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use docgraph_markdown::{RefToken, external_references, sections_for};
use docgraph_shared::{
    Component, Derivation, DocKind, Document, DocumentBundle, DocumentNode, Reference, Result,
    DocGraphError, ScoringConfig, Section, SelectionConfig, SelectionPayload, document_id,
    is_valid_slug,
};

use crate::score::score_section;

/// Hex characters kept from the SHA-256 digest of a component key.
pub const COMPONENT_ID_LEN: usize = 40;

/// Deterministic component id for a section: hex SHA-256 of `"{doc_id}#{anchor}"`,
/// truncated to [`COMPONENT_ID_LEN`] characters.
pub fn component_id(doc_id: &str, anchor: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(doc_id.as_bytes());
    hasher.update(b"#");
    hasher.update(anchor.as_bytes());
    let mut hash = format!("{:x}", hasher.finalize());
    hash.truncate(COMPONENT_ID_LEN);
    hash
}

/// Build the selection payload for `bundle`.
///
/// The config and every document slug are validated before anything else is computed.
#[instrument(skip_all, fields(documents = bundle.len(), selection_v = %config.selection_v))]
pub fn select(bundle: &DocumentBundle, config: &SelectionConfig) -> Result<SelectionPayload> {
    config.validate()?;
    if let Some(doc) = bundle.documents().find(|d| !is_valid_slug(&d.slug)) {
        return Err(DocGraphError::validation(format!(
            "invalid slug `{}` for {}",
            doc.slug, doc.kind
        )));
    }
    let scoring = config.scoring();

    let mut documents = Vec::with_capacity(bundle.len());
    let mut components = Vec::new();
    let mut keep_by_doc = BTreeMap::new();

    for document in bundle.documents() {
        let kept = select_components(document, config, &scoring);
        keep_by_doc.insert(
            document.id(),
            kept.iter().map(|c| c.id.clone()).collect::<Vec<_>>(),
        );
        documents.push(DocumentNode::from(document));
        components.extend(kept);
    }

    // Global safety valve: drop from the tail of the bundle-ordered list.
    let budget = config.max_nodes_per_run.saturating_sub(documents.len());
    if components.len() > budget {
        debug!(
            dropped = components.len() - budget,
            max_nodes = config.max_nodes_per_run,
            "global node cap reached, truncating components"
        );
        components.truncate(budget);
    }

    let payload = SelectionPayload {
        selection_v: config.selection_v.clone(),
        documents,
        components,
        references: resolve_references(bundle),
        derivations: derivations(bundle),
        keep_by_doc,
    };

    debug!(
        components = payload.components.len(),
        references = payload.references.len(),
        derivations = payload.derivations.len(),
        "selection complete"
    );
    Ok(payload)
}

/// Score, filter, sort, take for one document.
fn select_components(
    document: &Document,
    config: &SelectionConfig,
    scoring: &ScoringConfig,
) -> Vec<Component> {
    let doc_id = document.id();

    let mut scored: Vec<(i64, Section)> = sections_for(document)
        .into_iter()
        .map(|s| (score_section(document, &s, scoring), s))
        .filter(|(score, _)| *score >= config.threshold)
        .collect();

    scored.sort_by(|(sa, a), (sb, b)| by_priority(*sa, &a.anchor, *sb, &b.anchor));

    scored
        .into_iter()
        .take(config.top_k_per_doc)
        .map(|(score, section)| Component {
            id: component_id(&doc_id, &section.anchor),
            doc_id: doc_id.clone(),
            component_type: section
                .heading
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string(),
            title: section.heading,
            anchor: section.anchor,
            order: section.order,
            score,
        })
        .collect()
}

/// Score descending, then anchor ascending.
fn by_priority(score_a: i64, anchor_a: &str, score_b: i64, anchor_b: &str) -> Ordering {
    score_b.cmp(&score_a).then_with(|| anchor_a.cmp(anchor_b))
}

// ---------------------------------------------------------------------------
// Document-level edges
// ---------------------------------------------------------------------------

/// References declared in each document's text, resolved to document ids.
///
/// Qualified tokens map straight to `KIND:slug` when the kind is known. Bare
/// slugs resolve only when exactly one other document in the bundle has that
/// slug; ambiguous or unknown bare slugs are dropped.
fn resolve_references(bundle: &DocumentBundle) -> Vec<Reference> {
    let mut references = BTreeSet::new();

    for document in bundle.documents() {
        let src = document.id();
        let text = reference_text(document);

        for token in external_references(&text, &src, &document.slug) {
            let dst = match &token {
                RefToken::Qualified { kind, slug } => match kind.parse::<DocKind>() {
                    Ok(kind) => Some(document_id(kind.as_str(), slug)),
                    Err(_) => {
                        debug!(%src, %token, "unknown document kind in reference, skipping");
                        None
                    }
                },
                RefToken::Bare(slug) => resolve_bare_slug(bundle, &src, slug),
            };

            if let Some(dst) = dst.filter(|dst| *dst != src) {
                references.insert(Reference {
                    src: src.clone(),
                    dst,
                });
            }
        }
    }

    references.into_iter().collect()
}

/// The raw text to scan; documents supplied only as sections are scanned section by section.
fn reference_text(document: &Document) -> String {
    match &document.sections {
        Some(sections) if document.text.trim().is_empty() => sections
            .iter()
            .map(|s| s.content.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => document.text.clone(),
    }
}

fn resolve_bare_slug(bundle: &DocumentBundle, src: &str, slug: &str) -> Option<String> {
    let mut candidates = bundle
        .documents()
        .filter(|d| d.slug == slug)
        .map(Document::id)
        .filter(|id| id != src);

    match (candidates.next(), candidates.next()) {
        (Some(id), None) => Some(id),
        _ => None,
    }
}

/// Fixed-kind derivations (X ← DS, SP ← DS) for documents present together.
fn derivations(bundle: &DocumentBundle) -> Vec<Derivation> {
    bundle
        .documents()
        .filter_map(|document| {
            let parent = bundle.get(document.kind.derived_from()?)?;
            Some(Derivation {
                src: document.id(),
                dst: parent.id(),
            })
        })
        .collect()
}
