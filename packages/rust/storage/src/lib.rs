//! libSQL (embedded SQLite) graph store.
//!
//! The [`GraphStore`] owns the database; callers acquire a [`Session`] per
//! unit of work and drop it when done. Node and edge uniqueness is enforced
//! by primary keys, foreign keys are switched on for every session.
//!
//! **Access rules:**
//! - synchronizer: read-write via [`GraphStore::open`], writes only through
//!   [`Session::begin`]
//! - inspection tooling: read-only via [`GraphStore::open_readonly`]

mod migrations;
mod writer;

use std::path::Path;
use std::time::Duration;

use libsql::{Connection, Database, TransactionBehavior, params};
use serde::Serialize;

use docgraph_shared::{DocGraphError, Result};

pub use writer::GraphWriter;

/// How long a connection waits on another writer's lock before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Primary store handle wrapping a libSQL database.
pub struct GraphStore {
    db: Database,
    readonly: bool,
    busy_timeout: Duration,
}

impl GraphStore {
    /// Open or create a store at `path` in read-write mode, applying migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        Self::open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT).await
    }

    /// Like [`GraphStore::open`], but sessions wait at most `busy_timeout`
    /// for a concurrent writer to release the database lock.
    pub async fn open_with_busy_timeout(path: &Path, busy_timeout: Duration) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DocGraphError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(DocGraphError::storage)?;

        let store = Self {
            db,
            readonly: false,
            busy_timeout,
        };
        let session = store.session().await?;
        session.run_migrations().await?;
        Ok(store)
    }

    /// Open an existing store at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DocGraphError::Storage(format!(
                "no graph store at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(DocGraphError::storage)?;

        Ok(Self {
            db,
            readonly: true,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        })
    }

    /// Acquire a session. The connection closes when the session is dropped.
    pub async fn session(&self) -> Result<Session> {
        let conn = self.db.connect().map_err(DocGraphError::storage)?;
        conn.busy_timeout(self.busy_timeout)
            .map_err(DocGraphError::storage)?;
        conn.execute("PRAGMA foreign_keys = ON", params![])
            .await
            .map_err(DocGraphError::storage)?;

        Ok(Session {
            conn,
            readonly: self.readonly,
        })
    }
}

/// One connection to the store.
pub struct Session {
    conn: Connection,
    readonly: bool,
}

impl Session {
    /// Run pending schema migrations.
    ///
    /// The version is read inside an IMMEDIATE transaction, so two processes
    /// opening a fresh store cannot both apply the same migration.
    async fn run_migrations(&self) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(DocGraphError::storage)?;
        let current_version = read_schema_version(&tx).await?;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                tx.execute_batch(migration.sql).await.map_err(|e| {
                    DocGraphError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        tx.commit().await.map_err(DocGraphError::storage)
    }

    /// Current schema version, or 0 if no migrations have been applied.
    pub async fn schema_version(&self) -> Result<u32> {
        read_schema_version(&self.conn).await
    }

    /// Start an IMMEDIATE transaction and return its writer.
    ///
    /// IMMEDIATE takes the write lock up front, so two reconciliations can
    /// never interleave their prune steps.
    pub async fn begin(&self) -> Result<GraphWriter> {
        if self.readonly {
            return Err(DocGraphError::Storage(
                "graph store is opened in read-only mode".into(),
            ));
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(DocGraphError::storage)?;
        Ok(GraphWriter::new(tx))
    }

    // -----------------------------------------------------------------------
    // Read queries
    // -----------------------------------------------------------------------

    /// Node and edge counts.
    pub async fn stats(&self) -> Result<GraphStats> {
        Ok(GraphStats {
            documents: self.count("SELECT COUNT(*) FROM documents WHERE stub = 0").await?,
            stub_documents: self.count("SELECT COUNT(*) FROM documents WHERE stub = 1").await?,
            components: self.count("SELECT COUNT(*) FROM components").await?,
            containment_edges: self.count("SELECT COUNT(*) FROM contains").await?,
            reference_edges: self.count("SELECT COUNT(*) FROM doc_references").await?,
            derivation_edges: self.count("SELECT COUNT(*) FROM derivations").await?,
        })
    }

    /// Look up a document node by id.
    pub async fn document(&self, id: &str) -> Result<Option<StoredDocument>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, kind, slug, title, selection_v, stub FROM documents WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(DocGraphError::storage)?;

        match rows.next().await.map_err(DocGraphError::storage)? {
            Some(row) => Ok(Some(row_to_document(&row)?)),
            None => Ok(None),
        }
    }

    /// Components contained by `doc_id`, in section order.
    pub async fn document_components(&self, doc_id: &str) -> Result<Vec<StoredComponent>> {
        let mut rows = self
            .conn
            .query(
                "SELECT c.id, c.component_type, c.title, c.anchor, c.ord, c.score, c.selection_v
                 FROM components c
                 JOIN contains k ON k.component_id = c.id
                 WHERE k.doc_id = ?1
                 ORDER BY c.ord, c.id",
                params![doc_id],
            )
            .await
            .map_err(DocGraphError::storage)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(DocGraphError::storage)? {
            results.push(row_to_component(&row)?);
        }
        Ok(results)
    }

    /// All derivation edges as `(src, dst)`, sorted.
    pub async fn derivation_edges(&self) -> Result<Vec<(String, String)>> {
        self.edges("SELECT src, dst FROM derivations ORDER BY src, dst")
            .await
    }

    /// Full graph contents, sorted, without timestamps.
    ///
    /// Two snapshots compare equal exactly when the graph holds the same nodes,
    /// edges, and property values.
    pub async fn snapshot(&self) -> Result<GraphSnapshot> {
        let mut documents = Vec::new();
        let mut rows = self
            .conn
            .query(
                "SELECT id, kind, slug, title, selection_v, stub FROM documents ORDER BY id",
                params![],
            )
            .await
            .map_err(DocGraphError::storage)?;
        while let Some(row) = rows.next().await.map_err(DocGraphError::storage)? {
            documents.push(row_to_document(&row)?);
        }

        let mut components = Vec::new();
        let mut rows = self
            .conn
            .query(
                "SELECT id, component_type, title, anchor, ord, score, selection_v
                 FROM components ORDER BY id",
                params![],
            )
            .await
            .map_err(DocGraphError::storage)?;
        while let Some(row) = rows.next().await.map_err(DocGraphError::storage)? {
            components.push(row_to_component(&row)?);
        }

        Ok(GraphSnapshot {
            documents,
            components,
            containment: self
                .edges("SELECT doc_id, component_id FROM contains ORDER BY doc_id, component_id")
                .await?,
            references: self
                .edges("SELECT src, dst FROM doc_references ORDER BY src, dst")
                .await?,
            derivations: self.derivation_edges().await?,
        })
    }

    async fn count(&self, sql: &str) -> Result<u64> {
        let mut rows = self
            .conn
            .query(sql, params![])
            .await
            .map_err(DocGraphError::storage)?;

        match rows.next().await.map_err(DocGraphError::storage)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(DocGraphError::storage)? as u64),
            None => Ok(0),
        }
    }

    async fn edges(&self, sql: &str) -> Result<Vec<(String, String)>> {
        let mut rows = self
            .conn
            .query(sql, params![])
            .await
            .map_err(DocGraphError::storage)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(DocGraphError::storage)? {
            results.push((
                row.get::<String>(0).map_err(DocGraphError::storage)?,
                row.get::<String>(1).map_err(DocGraphError::storage)?,
            ));
        }
        Ok(results)
    }
}

/// Node and edge counts of the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub documents: u64,
    pub stub_documents: u64,
    pub components: u64,
    pub containment_edges: u64,
    pub reference_edges: u64,
    pub derivation_edges: u64,
}

/// A Document node as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredDocument {
    pub id: String,
    pub kind: String,
    pub slug: String,
    pub title: Option<String>,
    pub selection_v: Option<String>,
    /// Created only as a reference target, never synchronized itself.
    pub stub: bool,
}

/// A Component node as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredComponent {
    pub id: String,
    pub component_type: String,
    pub title: String,
    pub anchor: String,
    pub order: i64,
    pub score: i64,
    pub selection_v: String,
}

/// Sorted, timestamp-free dump of the whole graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphSnapshot {
    pub documents: Vec<StoredDocument>,
    pub components: Vec<StoredComponent>,
    pub containment: Vec<(String, String)>,
    pub references: Vec<(String, String)>,
    pub derivations: Vec<(String, String)>,
}

fn row_to_document(row: &libsql::Row) -> Result<StoredDocument> {
    Ok(StoredDocument {
        id: row.get::<String>(0).map_err(DocGraphError::storage)?,
        kind: row.get::<String>(1).map_err(DocGraphError::storage)?,
        slug: row.get::<String>(2).map_err(DocGraphError::storage)?,
        title: row.get::<String>(3).ok(),
        selection_v: row.get::<String>(4).ok(),
        stub: row.get::<i64>(5).map_err(DocGraphError::storage)? != 0,
    })
}

fn row_to_component(row: &libsql::Row) -> Result<StoredComponent> {
    Ok(StoredComponent {
        id: row.get::<String>(0).map_err(DocGraphError::storage)?,
        component_type: row.get::<String>(1).map_err(DocGraphError::storage)?,
        title: row.get::<String>(2).map_err(DocGraphError::storage)?,
        anchor: row.get::<String>(3).map_err(DocGraphError::storage)?,
        order: row.get::<i64>(4).map_err(DocGraphError::storage)?,
        score: row.get::<i64>(5).map_err(DocGraphError::storage)?,
        selection_v: row.get::<String>(6).map_err(DocGraphError::storage)?,
    })
}

/// A missing `schema_migrations` table means version 0. Any other failure
/// (locked, corrupt, unreadable) is an error.
async fn read_schema_version(conn: &Connection) -> Result<u32> {
    let mut rows = conn
        .query(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name = 'schema_migrations'",
            params![],
        )
        .await
        .map_err(DocGraphError::storage)?;
    let exists = match rows.next().await.map_err(DocGraphError::storage)? {
        Some(row) => row.get::<i64>(0).map_err(DocGraphError::storage)? > 0,
        None => false,
    };
    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            params![],
        )
        .await
        .map_err(DocGraphError::storage)?;
    match rows.next().await.map_err(DocGraphError::storage)? {
        Some(row) => row.get::<u32>(0).map_err(DocGraphError::storage),
        None => Ok(0),
    }
}
