//! SQL migration definitions for the graph store.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial graph schema: documents, components, contains, doc_references, derivations",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Document nodes (unique by id). Stubs are created for reference targets
-- that have not been synchronized yet.
CREATE TABLE IF NOT EXISTS documents (
    id          TEXT PRIMARY KEY,
    kind        TEXT NOT NULL,
    slug        TEXT NOT NULL,
    title       TEXT,
    updated_at  TEXT,
    selection_v TEXT,
    stub        INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_documents_kind ON documents(kind);

-- Component nodes (unique by id), one per selected section
CREATE TABLE IF NOT EXISTS components (
    id             TEXT PRIMARY KEY,
    component_type TEXT NOT NULL,
    title          TEXT NOT NULL,
    anchor         TEXT NOT NULL,
    ord            INTEGER NOT NULL,
    score          INTEGER NOT NULL,
    updated_at     TEXT NOT NULL,
    selection_v    TEXT NOT NULL
);

-- Containment edges: Document -> Component
CREATE TABLE IF NOT EXISTS contains (
    doc_id       TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    component_id TEXT NOT NULL REFERENCES components(id) ON DELETE CASCADE,
    PRIMARY KEY (doc_id, component_id)
);

CREATE INDEX IF NOT EXISTS idx_contains_component ON contains(component_id);

-- Reference edges: Document -> Document (additive only)
CREATE TABLE IF NOT EXISTS doc_references (
    src TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    dst TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    PRIMARY KEY (src, dst)
);

-- Derivation edges: Document -> Document, kept acyclic by the synchronizer
CREATE TABLE IF NOT EXISTS derivations (
    src TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    dst TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    PRIMARY KEY (src, dst)
);

CREATE INDEX IF NOT EXISTS idx_derivations_src ON derivations(src);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ascending() {
        let versions: Vec<u32> = all_migrations().iter().map(|m| m.version).collect();
        let mut sorted = versions.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(versions, sorted);
    }
}
