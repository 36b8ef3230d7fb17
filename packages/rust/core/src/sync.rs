//! Graph synchronization: reconcile a [`SelectionPayload`] against the store.
//!
//! One call is one IMMEDIATE transaction on a session opened for the call and
//! dropped on every exit path. Store failures never escape [`GraphSynchronizer::sync`];
//! they are logged and reported in the returned [`SyncReport`].
//!
//! The local libSQL driver completes every statement without yielding, so the
//! time budget is enforced by checking a [`Deadline`] between statements
//! rather than by racing the future against a timer.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use docgraph_shared::{DocGraphError, Result, SelectionPayload, SyncConfig};
use docgraph_storage::{GraphStore, GraphWriter};

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// How a synchronization run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Every step applied and the transaction committed.
    Committed,
    /// The feature gate is off; the store was not contacted.
    Disabled,
    /// A store error rolled the transaction back.
    Failed { error: String },
    /// The run exceeded `sync.timeout_ms` and was rolled back.
    TimedOut,
}

impl SyncOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOutcome::Committed => "committed",
            SyncOutcome::Disabled => "disabled",
            SyncOutcome::Failed { .. } => "failed",
            SyncOutcome::TimedOut => "timed_out",
        }
    }

    /// Committed or disabled. Callers treat anything else as "deferred".
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Committed | SyncOutcome::Disabled)
    }
}

impl std::fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run counters. Write counters stay zero unless the run committed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncCounts {
    /// Payload sizes.
    pub documents: usize,
    pub components: usize,
    pub references: usize,
    pub derivations: usize,
    /// Containment edges created this run.
    pub containment_linked: usize,
    /// Stale containment edges removed.
    pub containment_pruned: usize,
    /// Components garbage-collected after pruning.
    pub components_deleted: u64,
    /// Reference edges created this run.
    pub references_added: usize,
    /// Derivation edges created this run.
    pub derivations_added: usize,
    /// Derivation edges skipped because they would close a cycle.
    pub derivations_skipped: usize,
}

impl SyncCounts {
    fn planned(payload: &SelectionPayload) -> Self {
        Self {
            documents: payload.documents.len(),
            components: payload.components.len(),
            references: payload.references.len(),
            derivations: payload.derivations.len(),
            ..Self::default()
        }
    }
}

/// Result of one synchronization call.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub outcome: SyncOutcome,
    pub counts: SyncCounts,
    pub elapsed_ms: u64,
}

impl SyncReport {
    /// A report for a run that never reached the store.
    pub fn not_started(outcome: SyncOutcome, payload: Option<&SelectionPayload>) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            outcome,
            counts: payload.map(SyncCounts::planned).unwrap_or_default(),
            elapsed_ms: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Synchronizer
// ---------------------------------------------------------------------------

/// Time budget of one run, measured from the moment the run starts.
struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    fn new(start: Instant, budget: Duration) -> Self {
        Self { start, budget }
    }

    fn check(&self) -> Result<()> {
        if self.start.elapsed() >= self.budget {
            return Err(DocGraphError::timeout(self.budget));
        }
        Ok(())
    }
}

/// Reconciles selection payloads into a [`GraphStore`].
pub struct GraphSynchronizer<'a> {
    store: &'a GraphStore,
    config: SyncConfig,
}

impl<'a> GraphSynchronizer<'a> {
    pub fn new(store: &'a GraphStore, config: SyncConfig) -> Self {
        Self { store, config }
    }

    /// Reconcile `payload` in one transaction, bounded by the configured timeout.
    ///
    /// Never returns an error: failures are logged at `warn` and reflected in
    /// the report's outcome.
    #[instrument(skip_all, fields(selection_v = %payload.selection_v))]
    pub async fn sync(&self, payload: &SelectionPayload) -> SyncReport {
        let run_id = Uuid::now_v7();
        let start = Instant::now();

        if !self.config.enabled {
            let report = SyncReport {
                run_id,
                outcome: SyncOutcome::Disabled,
                counts: SyncCounts::planned(payload),
                elapsed_ms: 0,
            };
            log_report(&report);
            return report;
        }

        let deadline = Deadline::new(start, self.config.timeout());
        let (outcome, counts) = match self.reconcile(payload, &deadline).await {
            Ok(counts) => (SyncOutcome::Committed, counts),
            Err(DocGraphError::Timeout { .. }) => {
                (SyncOutcome::TimedOut, SyncCounts::planned(payload))
            }
            Err(e) => (
                SyncOutcome::Failed {
                    error: e.to_string(),
                },
                SyncCounts::planned(payload),
            ),
        };

        let report = SyncReport {
            run_id,
            outcome,
            counts,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        log_report(&report);
        report
    }

    async fn reconcile(
        &self,
        payload: &SelectionPayload,
        deadline: &Deadline,
    ) -> Result<SyncCounts> {
        let session = self.store.session().await?;
        let writer = session.begin().await?;
        let mut counts = SyncCounts::planned(payload);

        let applied = apply(&writer, payload, Utc::now(), deadline, &mut counts)
            .await
            .and_then(|()| deadline.check());
        match applied {
            Ok(()) => {
                writer.commit().await?;
                Ok(counts)
            }
            Err(e) => {
                if let Err(rollback) = writer.rollback().await {
                    warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }
}

/// Steps 1–6 of a reconciliation, in order, against an open transaction.
///
/// The deadline is checked before every statement.
async fn apply(
    writer: &GraphWriter,
    payload: &SelectionPayload,
    now: DateTime<Utc>,
    deadline: &Deadline,
    counts: &mut SyncCounts,
) -> Result<()> {
    let selection_v = payload.selection_v.as_str();

    // 1. Documents
    for doc in &payload.documents {
        deadline.check()?;
        writer.upsert_document(doc, selection_v, now).await?;
    }

    // 2. Components
    for component in &payload.components {
        deadline.check()?;
        writer.upsert_component(component, selection_v, now).await?;
    }

    // 3. Containment
    for component in &payload.components {
        deadline.check()?;
        if writer
            .link_containment(&component.doc_id, &component.id)
            .await?
        {
            counts.containment_linked += 1;
        }
    }

    // 4. Prune stale containment, then collect orphans
    for (doc_id, keep) in &payload.keep_by_doc {
        let keep: HashSet<&str> = keep.iter().map(String::as_str).collect();
        deadline.check()?;
        for target in writer.containment_targets(doc_id).await? {
            deadline.check()?;
            if !keep.contains(target.as_str()) && writer.unlink_containment(doc_id, &target).await? {
                debug!(%doc_id, component = %target, "pruned stale containment");
                counts.containment_pruned += 1;
            }
        }
    }
    deadline.check()?;
    counts.components_deleted = writer.delete_orphan_components().await?;

    // 5. References (additive only)
    for reference in &payload.references {
        deadline.check()?;
        writer.ensure_document(&reference.src).await?;
        writer.ensure_document(&reference.dst).await?;
        if writer.merge_reference(&reference.src, &reference.dst).await? {
            counts.references_added += 1;
        }
    }

    // 6. Derivations with cycle guard
    for derivation in &payload.derivations {
        deadline.check()?;
        writer.ensure_document(&derivation.src).await?;
        writer.ensure_document(&derivation.dst).await?;

        if writer
            .derivation_path_exists(&derivation.dst, &derivation.src)
            .await?
        {
            debug!(
                src = %derivation.src,
                dst = %derivation.dst,
                "derivation would close a cycle, skipping"
            );
            counts.derivations_skipped += 1;
            continue;
        }

        if writer
            .merge_derivation(&derivation.src, &derivation.dst)
            .await?
        {
            counts.derivations_added += 1;
        }
    }

    Ok(())
}

fn log_report(report: &SyncReport) {
    let c = &report.counts;
    match &report.outcome {
        SyncOutcome::Committed => info!(
            run_id = %report.run_id,
            outcome = %report.outcome,
            documents = c.documents,
            components = c.components,
            references = c.references,
            derivations = c.derivations,
            containment_linked = c.containment_linked,
            containment_pruned = c.containment_pruned,
            components_deleted = c.components_deleted,
            references_added = c.references_added,
            derivations_added = c.derivations_added,
            derivations_skipped = c.derivations_skipped,
            elapsed_ms = report.elapsed_ms,
            "graph sync finished"
        ),
        SyncOutcome::Failed { error } => warn!(
            run_id = %report.run_id,
            outcome = %report.outcome,
            %error,
            documents = c.documents,
            components = c.components,
            references = c.references,
            derivations = c.derivations,
            elapsed_ms = report.elapsed_ms,
            "graph sync failed, deferred to next run"
        ),
        SyncOutcome::TimedOut => warn!(
            run_id = %report.run_id,
            outcome = %report.outcome,
            documents = c.documents,
            components = c.components,
            references = c.references,
            derivations = c.derivations,
            elapsed_ms = report.elapsed_ms,
            "graph sync timed out, deferred to next run"
        ),
        SyncOutcome::Disabled => debug!(
            run_id = %report.run_id,
            documents = c.documents,
            components = c.components,
            "graph sync disabled, skipping"
        ),
    }
}
