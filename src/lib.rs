//! # TeXSearch
//!
//! Approximate search over a corpus of LaTeX fragments by edit distance
//! on structured token sequences. Given a query, TeXSearch returns the
//! ranked documents containing fragments within a computed edit-distance
//! cutoff.
//!
//! The pieces:
//!
//! | Crate | Responsibility |
//! |-------|----------------|
//! | `texsearch-core` | Token/forest model, fragments, errors |
//! | `texsearch-search` | Edit-distance kernel, BK-tree, resumable search |
//! | `texsearch-durability` | Crash-safe snapshot persistence |
//! | `texsearch-store` | Document-store clients, update reconciler |
//! | `texsearch-cli` | The `texsearch` binary: init / update / query |
//!
//! This crate re-exports the public API surface for embedding and for the
//! workspace integration tests.
//!
//! ```no_run
//! use texsearch::{Forest, IndexNode, MetricTree, Search, TermSeq, Token};
//!
//! let mut tree = MetricTree::new();
//! let forest = Forest::new(vec![Token::Text("x".into())]);
//! tree.add(IndexNode::new("10.1000/xyz", "eq1", &forest));
//!
//! let query = TermSeq::from_forest(&forest);
//! let mut search = Search::new(&tree, query, None);
//! let page = search.next_page(10).unwrap();
//! assert_eq!(page.matches()[0].distance, 0);
//! ```

pub use texsearch_core::{
    parse_forest, ErrorKind, Forest, ForestParseError, Fragment, Result, TermSeq, TexError, Token,
};
pub use texsearch_durability::{SnapshotError, SnapshotHeader};
pub use texsearch_search::{
    edit_distance, index_distance, left_edit_distance, IndexNode, Match, MetricTree, Page, Search,
    SearchQueue, BRANCH_SIZE, BUCKET_SIZE,
};
pub use texsearch_store::{
    apply_update, run_update_batch, run_updates, BatchOutcome, DocPayload, DocStoreClient,
    DocUpdate, FragmentPayload, PersistentIndex, PreprocessorClient, UpdateSource, BATCH_SIZE,
};
