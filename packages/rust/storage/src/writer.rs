//! Transactional write access to the graph.
//!
//! A [`GraphWriter`] wraps one IMMEDIATE libSQL transaction. Every merge is
//! an `INSERT ... ON CONFLICT`, so repeating a write never duplicates a node
//! or an edge. Dropping the writer without calling [`GraphWriter::commit`]
//! rolls the transaction back.

use chrono::{DateTime, Utc};
use libsql::{Transaction, params};

use docgraph_shared::{Component, DocGraphError, DocumentNode, Result, split_document_id};

/// Write handle for one reconciliation transaction.
pub struct GraphWriter {
    tx: Transaction,
}

impl GraphWriter {
    pub(crate) fn new(tx: Transaction) -> Self {
        Self { tx }
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(DocGraphError::storage)
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.map_err(DocGraphError::storage)
    }

    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    /// Merge a Document node by id and overwrite its properties.
    pub async fn upsert_document(
        &self,
        doc: &DocumentNode,
        selection_v: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.tx
            .execute(
                "INSERT INTO documents (id, kind, slug, title, updated_at, selection_v, stub)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)
                 ON CONFLICT(id) DO UPDATE SET
                   kind = excluded.kind,
                   slug = excluded.slug,
                   title = excluded.title,
                   updated_at = excluded.updated_at,
                   selection_v = excluded.selection_v,
                   stub = 0",
                params![
                    doc.id.as_str(),
                    doc.kind.as_str(),
                    doc.slug.as_str(),
                    doc.title.as_str(),
                    now.to_rfc3339(),
                    selection_v,
                ],
            )
            .await
            .map_err(DocGraphError::storage)?;
        Ok(())
    }

    /// Create a stub Document node for `id` unless one already exists.
    pub async fn ensure_document(&self, id: &str) -> Result<()> {
        let (kind, slug) = split_document_id(id);
        self.tx
            .execute(
                "INSERT INTO documents (id, kind, slug, stub) VALUES (?1, ?2, ?3, 1)
                 ON CONFLICT(id) DO NOTHING",
                params![id, kind, slug],
            )
            .await
            .map_err(DocGraphError::storage)?;
        Ok(())
    }

    /// Merge a Component node by id and overwrite its properties.
    pub async fn upsert_component(
        &self,
        component: &Component,
        selection_v: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.tx
            .execute(
                "INSERT INTO components (id, component_type, title, anchor, ord, score, updated_at, selection_v)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                   component_type = excluded.component_type,
                   title = excluded.title,
                   anchor = excluded.anchor,
                   ord = excluded.ord,
                   score = excluded.score,
                   updated_at = excluded.updated_at,
                   selection_v = excluded.selection_v",
                params![
                    component.id.as_str(),
                    component.component_type.as_str(),
                    component.title.as_str(),
                    component.anchor.as_str(),
                    component.order as i64,
                    component.score,
                    now.to_rfc3339(),
                    selection_v,
                ],
            )
            .await
            .map_err(DocGraphError::storage)?;
        Ok(())
    }

    /// Delete every component that no document contains. Returns the number deleted.
    pub async fn delete_orphan_components(&self) -> Result<u64> {
        self.tx
            .execute(
                "DELETE FROM components
                 WHERE id NOT IN (SELECT component_id FROM contains)",
                params![],
            )
            .await
            .map_err(DocGraphError::storage)
    }

    // -----------------------------------------------------------------------
    // Containment edges
    // -----------------------------------------------------------------------

    /// Merge a containment edge. Returns true when the edge is new.
    pub async fn link_containment(&self, doc_id: &str, component_id: &str) -> Result<bool> {
        let inserted = self
            .tx
            .execute(
                "INSERT INTO contains (doc_id, component_id) VALUES (?1, ?2)
                 ON CONFLICT(doc_id, component_id) DO NOTHING",
                params![doc_id, component_id],
            )
            .await
            .map_err(DocGraphError::storage)?;
        Ok(inserted > 0)
    }

    /// Component ids currently contained by `doc_id`.
    pub async fn containment_targets(&self, doc_id: &str) -> Result<Vec<String>> {
        let mut rows = self
            .tx
            .query(
                "SELECT component_id FROM contains WHERE doc_id = ?1 ORDER BY component_id",
                params![doc_id],
            )
            .await
            .map_err(DocGraphError::storage)?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await.map_err(DocGraphError::storage)? {
            ids.push(row.get::<String>(0).map_err(DocGraphError::storage)?);
        }
        Ok(ids)
    }

    /// Delete one containment edge. Returns true when an edge was removed.
    pub async fn unlink_containment(&self, doc_id: &str, component_id: &str) -> Result<bool> {
        let deleted = self
            .tx
            .execute(
                "DELETE FROM contains WHERE doc_id = ?1 AND component_id = ?2",
                params![doc_id, component_id],
            )
            .await
            .map_err(DocGraphError::storage)?;
        Ok(deleted > 0)
    }

    // -----------------------------------------------------------------------
    // Reference and derivation edges
    // -----------------------------------------------------------------------

    /// Merge a reference edge. Both endpoints must exist (see [`Self::ensure_document`]).
    pub async fn merge_reference(&self, src: &str, dst: &str) -> Result<bool> {
        let inserted = self
            .tx
            .execute(
                "INSERT INTO doc_references (src, dst) VALUES (?1, ?2)
                 ON CONFLICT(src, dst) DO NOTHING",
                params![src, dst],
            )
            .await
            .map_err(DocGraphError::storage)?;
        Ok(inserted > 0)
    }

    /// Whether a directed path `from ⇒ to` exists over derivation edges,
    /// of any length. A node always reaches itself.
    pub async fn derivation_path_exists(&self, from: &str, to: &str) -> Result<bool> {
        let mut rows = self
            .tx
            .query(
                "WITH RECURSIVE reach(id) AS (
                    SELECT ?1
                    UNION
                    SELECT d.dst FROM derivations d JOIN reach r ON d.src = r.id
                 )
                 SELECT 1 FROM reach WHERE id = ?2 LIMIT 1",
                params![from, to],
            )
            .await
            .map_err(DocGraphError::storage)?;

        Ok(rows.next().await.map_err(DocGraphError::storage)?.is_some())
    }

    /// Merge a derivation edge. Callers check [`Self::derivation_path_exists`] first.
    pub async fn merge_derivation(&self, src: &str, dst: &str) -> Result<bool> {
        let inserted = self
            .tx
            .execute(
                "INSERT INTO derivations (src, dst) VALUES (?1, ?2)
                 ON CONFLICT(src, dst) DO NOTHING",
                params![src, dst],
            )
            .await
            .map_err(DocGraphError::storage)?;
        Ok(inserted > 0)
    }
}
