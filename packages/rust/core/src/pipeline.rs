//! End-to-end flows: bundle → selection → (optional) graph sync.

use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use docgraph_shared::{AppConfig, DocumentBundle, Result, SelectionPayload};
use docgraph_storage::GraphStore;

use crate::select::select;
use crate::sync::{GraphSynchronizer, SyncOutcome, SyncReport};

/// Dry run: compute what would be persisted without contacting the store.
#[instrument(skip_all, fields(documents = bundle.len()))]
pub fn preview(bundle: &DocumentBundle, config: &AppConfig) -> Result<SelectionPayload> {
    select(bundle, &config.selection)
}

/// Select from `bundle` and reconcile the result into the configured store.
///
/// Selection and configuration errors propagate. Everything past selection is
/// reported through the returned [`SyncReport`]: a disabled gate returns before
/// the store is opened, and a store that cannot be opened is a failed run.
#[instrument(skip_all, fields(documents = bundle.len(), store = %config.store.path))]
pub async fn select_and_sync(bundle: &DocumentBundle, config: &AppConfig) -> Result<SyncReport> {
    config.sync.validate()?;
    let payload = select(bundle, &config.selection)?;

    if !config.sync.enabled {
        info!("graph sync disabled, selection not persisted");
        return Ok(SyncReport::not_started(SyncOutcome::Disabled, Some(&payload)));
    }

    let store = match open_store(config).await {
        Ok(store) => store,
        Err(e) => {
            warn!(error = %e, "graph store unavailable, sync deferred");
            return Ok(SyncReport::not_started(
                SyncOutcome::Failed {
                    error: e.to_string(),
                },
                Some(&payload),
            ));
        }
    };

    let report = GraphSynchronizer::new(&store, config.sync.clone())
        .sync(&payload)
        .await;
    Ok(report)
}

/// Fire-and-forget variant for callers that must not wait on, or fail with,
/// the graph sync (e.g. right after a document save).
///
/// Selection errors are logged and surface as a failed report; the task never panics.
pub fn spawn_sync(bundle: DocumentBundle, config: AppConfig) -> JoinHandle<SyncReport> {
    tokio::spawn(async move {
        match select_and_sync(&bundle, &config).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "selection failed, graph sync skipped");
                SyncReport::not_started(
                    SyncOutcome::Failed {
                        error: e.to_string(),
                    },
                    None,
                )
            }
        }
    })
}

/// Lock waits are bounded by the same budget as the run itself.
async fn open_store(config: &AppConfig) -> Result<GraphStore> {
    let path = config.store.resolved_path()?;
    GraphStore::open_with_busy_timeout(&path, config.sync.timeout()).await
}
