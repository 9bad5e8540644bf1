//! Update reconciliation
//!
//! Turns the store's monotonically-increasing update feed into index
//! deltas. Each batch is applied to an in-memory copy of the index and
//! persisted atomically before the next batch is fetched, so a crash
//! between batches loses nothing and replays nothing.
//!
//! A document update always tombstones whatever the index held for that
//! document; unless the update is a deletion, the new fragments are then
//! added. Per-update failures are logged and skipped; the watermark only
//! advances past updates that applied cleanly.

use crate::couch::{DocPayload, DocStoreClient, DocUpdate};
use crate::state::PersistentIndex;
use std::path::Path;
use texsearch_core::{parse_forest, Fragment, Result, TexError};
use texsearch_search::IndexNode;
use tracing::{debug, info, warn};

/// Maximum updates fetched and applied per batch
pub const BATCH_SIZE: usize = 100;

/// Source of sequential document updates
///
/// The HTTP store implements this; tests substitute an in-memory feed.
pub trait UpdateSource {
    /// Fetch up to `limit` updates with sequence strictly after `since`,
    /// ordered by sequence
    fn fetch_updates(&self, since: u64, limit: usize) -> Result<Vec<DocUpdate>>;
}

impl UpdateSource for DocStoreClient {
    fn fetch_updates(&self, since: u64, limit: usize) -> Result<Vec<DocUpdate>> {
        DocStoreClient::fetch_updates(self, since, limit)
    }
}

/// Outcome of one applied batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Updates the feed returned
    pub fetched: usize,
    /// Updates applied cleanly
    pub applied: usize,
}

fn fragments_of_payload(payload: &DocPayload) -> Result<Vec<Fragment>> {
    payload
        .fragments
        .iter()
        .map(|(fragment_id, stored)| {
            let tokens = parse_forest(&stored.tokens).map_err(|e| {
                TexError::upstream(format!("fragment {}: {}", fragment_id, e))
            })?;
            Ok(Fragment::new(
                fragment_id.clone(),
                stored.source.clone(),
                tokens,
            ))
        })
        .collect()
}

/// Apply one update to the in-memory index
///
/// The payload is parsed into fragments in full before the tree is
/// touched, so a malformed fragment skips the whole update instead of
/// half-applying it. Returns the number of index nodes added.
pub fn apply_update(index: &mut PersistentIndex, update: &DocUpdate) -> Result<usize> {
    let fragments = if update.deleted {
        Vec::new()
    } else {
        let payload = update
            .payload
            .as_ref()
            .ok_or_else(|| TexError::upstream("update is missing its document body"))?;
        fragments_of_payload(payload)?
    };

    index.tree.delete(&update.doc_id);
    let added = fragments.len();
    for fragment in &fragments {
        index
            .tree
            .add(IndexNode::from_fragment(update.doc_id.as_str(), fragment));
    }
    index.last_update = update.seq;
    Ok(added)
}

/// Fetch and apply one batch of updates
///
/// Failed updates are logged and skipped without advancing the
/// watermark; later successes in the same batch advance past them.
pub fn run_update_batch(
    index: &mut PersistentIndex,
    source: &dyn UpdateSource,
) -> Result<BatchOutcome> {
    let updates = source.fetch_updates(index.last_update, BATCH_SIZE)?;
    let fetched = updates.len();
    let mut applied = 0;
    for update in &updates {
        match apply_update(index, update) {
            Ok(added) => {
                applied += 1;
                debug!(
                    doc_id = %update.doc_id,
                    seq = update.seq,
                    deleted = update.deleted,
                    added,
                    "applied update"
                );
            }
            Err(e) => {
                warn!(
                    doc_id = %update.doc_id,
                    seq = update.seq,
                    error = %e,
                    "skipping update"
                );
            }
        }
    }
    Ok(BatchOutcome { fetched, applied })
}

/// Reconcile to fixed point
///
/// Loads the snapshot, then repeatedly applies a batch and persists the
/// result, reloading from disk each round, until the watermark stops
/// advancing. Bounded memory however deep the backlog. Returns the final
/// watermark.
pub fn run_updates(path: &Path, source: &dyn UpdateSource) -> Result<u64> {
    loop {
        let mut index = PersistentIndex::load(path)?;
        let before = index.last_update;
        let outcome = run_update_batch(&mut index, source)?;
        if index.last_update == before {
            info!(last_update = before, "index is up to date");
            return Ok(before);
        }
        index.save(path)?;
        info!(
            fetched = outcome.fetched,
            applied = outcome.applied,
            last_update = index.last_update,
            entries = index.tree.len(),
            "batch persisted"
        );
    }
}
