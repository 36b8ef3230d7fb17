//! Selection and graph synchronization for docgraph.
//!
//! Flow: bundle → [`select()`](select::select) → [`SelectionPayload`](docgraph_shared::SelectionPayload)
//! → [`GraphSynchronizer`](sync::GraphSynchronizer). The [`pipeline`] module
//! wires these together for callers.

pub mod bundle;
pub mod pipeline;
pub mod score;
pub mod select;
pub mod sync;

pub use bundle::{load_bundle, load_bundle_dir, load_bundle_json};
pub use pipeline::{preview, select_and_sync, spawn_sync};
pub use score::score_section;
pub use select::{component_id, select};
pub use sync::{GraphSynchronizer, SyncCounts, SyncOutcome, SyncReport};
