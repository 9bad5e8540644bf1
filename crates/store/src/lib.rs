//! Ingest side of TeXSearch
//!
//! Clients for the external collaborators (the CouchDB-style document
//! store and the LaTeX preprocessor), the persistent index state, and the
//! reconciler that folds the store's update feed into the index with
//! crash-safe persistence.

pub mod couch;
pub mod preprocessor;
pub mod reconciler;
pub mod state;

pub use couch::{DocPayload, DocStoreClient, DocUpdate, FragmentPayload};
pub use preprocessor::PreprocessorClient;
pub use reconciler::{
    apply_update, run_update_batch, run_updates, BatchOutcome, UpdateSource, BATCH_SIZE,
};
pub use state::PersistentIndex;
